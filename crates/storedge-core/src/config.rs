//! Configuration module
//!
//! Runtime settings for the StorEdge services, read from the process environment
//! (and a `.env` file when present).

use std::env;
use std::time::Duration;

use crate::constants::{
    DEFAULT_MAX_NAME_LEN, DEFAULT_MAX_TAGS_PER_FILE, DEFAULT_MAX_UPLOAD_BYTES,
    DEFAULT_ORPHAN_GRACE_PERIOD_SECS, DEFAULT_UPLOAD_TIMEOUT_SECS,
};
use crate::models::Limits;
use crate::storage_types::{CatalogBackend, StorageBackend};

const MAX_CONNECTIONS: u32 = 20;
const DEFAULT_LOCAL_STORAGE_PATH: &str = "./data/storage";

#[derive(Clone, Debug)]
pub struct Config {
    /// Postgres connection string. Without it the in-memory catalog is used.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub storage_backend: StorageBackend,
    pub local_storage_path: String,
    pub limits: Limits,
    pub upload_timeout_secs: u64,
    pub orphan_grace_period_secs: u64,
    pub webhook_url: Option<String>,
    pub webhook_signing_secret: Option<String>,
    pub environment: String,
    pub log_format: String,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|s| !s.is_empty());

        // Durable objects only make sense next to a durable catalog.
        let storage_backend = match lookup("STORAGE_BACKEND") {
            Some(raw) => raw.parse()?,
            None if database_url.is_some() => StorageBackend::Local,
            None => StorageBackend::Memory,
        };

        let limits = Limits {
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            max_tags_per_file: parse_or(&lookup, "MAX_TAGS_PER_FILE", DEFAULT_MAX_TAGS_PER_FILE)?,
            max_name_len: parse_or(&lookup, "MAX_NAME_LEN", DEFAULT_MAX_NAME_LEN)?,
        };

        Ok(Config {
            database_url,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", MAX_CONNECTIONS)?,
            storage_backend,
            local_storage_path: lookup("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|| DEFAULT_LOCAL_STORAGE_PATH.to_string()),
            limits,
            upload_timeout_secs: parse_or(
                &lookup,
                "UPLOAD_TIMEOUT_SECS",
                DEFAULT_UPLOAD_TIMEOUT_SECS,
            )?,
            orphan_grace_period_secs: parse_or(
                &lookup,
                "ORPHAN_GRACE_PERIOD_SECS",
                DEFAULT_ORPHAN_GRACE_PERIOD_SECS,
            )?,
            webhook_url: lookup("WEBHOOK_URL").filter(|s| !s.is_empty()),
            webhook_signing_secret: lookup("WEBHOOK_SIGNING_SECRET").filter(|s| !s.is_empty()),
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            log_format: lookup("LOG_FORMAT").unwrap_or_else(|| "pretty".to_string()),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(url) = &self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        if self.limits.max_upload_bytes <= 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_BYTES must be positive"));
        }
        if self.limits.max_tags_per_file == 0 {
            return Err(anyhow::anyhow!("MAX_TAGS_PER_FILE must be positive"));
        }
        if self.limits.max_name_len == 0 {
            return Err(anyhow::anyhow!("MAX_NAME_LEN must be positive"));
        }

        if self.upload_timeout_secs == 0 {
            return Err(anyhow::anyhow!("UPLOAD_TIMEOUT_SECS must be positive"));
        }
        if self.orphan_grace_period_secs <= self.upload_timeout_secs {
            return Err(anyhow::anyhow!(
                "ORPHAN_GRACE_PERIOD_SECS must be larger than UPLOAD_TIMEOUT_SECS"
            ));
        }

        if self.storage_backend == StorageBackend::Local && self.local_storage_path.is_empty() {
            return Err(anyhow::anyhow!(
                "LOCAL_STORAGE_PATH must be set when using local storage backend"
            ));
        }

        if self.storage_backend == StorageBackend::Local
            && self.catalog_backend() == CatalogBackend::Memory
        {
            return Err(anyhow::anyhow!(
                "STORAGE_BACKEND=local requires DATABASE_URL; the in-memory catalog \
                 would forget every stored object"
            ));
        }

        if self.webhook_signing_secret.is_some() && self.webhook_url.is_none() {
            return Err(anyhow::anyhow!(
                "WEBHOOK_SIGNING_SECRET requires WEBHOOK_URL to be set"
            ));
        }

        Ok(())
    }

    pub fn catalog_backend(&self) -> CatalogBackend {
        if self.database_url.is_some() {
            CatalogBackend::Postgres
        } else {
            CatalogBackend::Memory
        }
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn orphan_grace_period(&self) -> Duration {
        Duration::from_secs(self.orphan_grace_period_secs)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn log_json(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number", key)),
        None => Ok(default),
    }
}
