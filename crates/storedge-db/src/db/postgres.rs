//! Postgres catalog
//!
//! Runtime-checked sqlx queries against the `files` and `idempotency_keys` tables
//! created by the workspace `migrations/`.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use storedge_core::{
    AppError, Config, File, FileId, FileRecord, IdempotencyKey, OwnerId, StorageRef,
};

use super::catalog::{Catalog, CatalogTransaction, Claim, ListQuery, Page, TransactionCoordinator};

const FILE_COLUMNS: &str =
    "id, name, size, content_type, checksum, created_at, owner_id, tags, storage_ref";

/// Setup database connection pool and run migrations
pub async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set for the Postgres catalog")?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections,
        "Database connected successfully"
    );

    // Path: workspace migrations/ from crate root
    let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
    let migrator = sqlx::migrate::Migrator::new(migrations_dir)
        .await
        .context("Failed to load migrations")?;
    migrator
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

/// Row type for the files table.
#[derive(Debug, sqlx::FromRow)]
struct FileRow {
    id: String,
    name: String,
    size: i64,
    content_type: String,
    checksum: String,
    created_at: DateTime<Utc>,
    owner_id: String,
    tags: Vec<String>,
    storage_ref: String,
}

impl FileRow {
    fn into_file(self) -> Result<File, AppError> {
        File::restore(FileRecord {
            id: self.id,
            name: self.name,
            size: self.size,
            content_type: self.content_type,
            checksum: self.checksum,
            created_at: self.created_at,
            owner_id: self.owner_id,
            tags: self.tags,
            storage_ref: self.storage_ref,
        })
        .map_err(|e| AppError::Internal(format!("Corrupt catalog row: {}", e)))
    }
}

/// Escape `%`, `_` and `\` so user text matches literally inside ILIKE.
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Postgres-backed catalog and transaction coordinator.
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select", db.record_id = %id))]
    async fn get(&self, id: &FileId) -> Result<Option<File>, AppError> {
        let row: Option<FileRow> = sqlx::query_as::<Postgres, FileRow>(&format!(
            "SELECT {} FROM files WHERE id = $1",
            FILE_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(FileRow::into_file).transpose()
    }

    #[tracing::instrument(skip(self, query), fields(db.table = "files", db.operation = "select"))]
    async fn list(&self, query: &ListQuery) -> Result<Page, AppError> {
        let limit = query.effective_limit();
        let pattern = query
            .query
            .as_deref()
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", escape_like(q)));
        let (after_ts, after_id) = match &query.after {
            Some(cursor) => (Some(cursor.created_at), Some(cursor.id.as_str())),
            None => (None, None),
        };

        let rows: Vec<FileRow> = sqlx::query_as::<Postgres, FileRow>(&format!(
            "SELECT {} FROM files \
             WHERE ($1::text IS NULL OR owner_id = $1) \
               AND ($2::text IS NULL OR $2 = ANY(tags)) \
               AND ($3::text IS NULL OR name ILIKE $3 ESCAPE '\\') \
               AND ($4::timestamptz IS NULL OR (created_at, id) > ($4, $5::text)) \
             ORDER BY created_at ASC, id ASC \
             LIMIT $6",
            FILE_COLUMNS
        ))
        .bind(query.owner_id.as_ref().map(|o| o.as_str()))
        .bind(query.tag.as_ref().map(|t| t.as_str()))
        .bind(pattern)
        .bind(after_ts)
        .bind(after_id)
        .bind((limit + 1) as i64)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(FileRow::into_file)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::from_overfetch(items, limit))
    }

    #[tracing::instrument(skip(self), fields(db.table = "idempotency_keys", db.operation = "select"))]
    async fn find_idempotency_key(
        &self,
        owner: &OwnerId,
        key: &IdempotencyKey,
    ) -> Result<Option<FileId>, AppError> {
        let file_id: Option<String> = sqlx::query_scalar(
            "SELECT file_id FROM idempotency_keys WHERE owner_id = $1 AND key = $2",
        )
        .bind(owner.as_str())
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        file_id
            .map(|id| FileId::parse(&id))
            .transpose()
            .map_err(|e| AppError::Internal(format!("Corrupt idempotency row: {}", e)))
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    async fn file_exists_for_ref(&self, storage_ref: &StorageRef) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM files WHERE storage_ref = $1)")
                .bind(storage_ref.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}

#[async_trait]
impl TransactionCoordinator for PgCatalog {
    async fn begin(&self) -> Result<Box<dyn CatalogTransaction>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgCatalogTransaction { tx }))
    }
}

/// Open Postgres transaction; sqlx rolls it back if dropped uncommitted.
pub struct PgCatalogTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CatalogTransaction for PgCatalogTransaction {
    #[tracing::instrument(skip(self, file), fields(db.table = "files", db.operation = "insert", db.record_id = %file.id()))]
    async fn create(&mut self, file: &File) -> Result<(), AppError> {
        let tags: Vec<&str> = file.tags().iter().map(|t| t.as_str()).collect();

        let result = sqlx::query(
            "INSERT INTO files (id, name, size, content_type, checksum, created_at, owner_id, tags, storage_ref) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(file.id().as_str())
        .bind(file.name())
        .bind(file.size() as i64)
        .bind(file.content_type())
        .bind(file.checksum().as_str())
        .bind(file.created_at())
        .bind(file.owner_id().as_str())
        .bind(&tags)
        .bind(file.storage_ref().as_str())
        .execute(&mut *self.tx)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                AppError::Conflict(format!("File {} already exists", file.id())),
            ),
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "delete", db.record_id = %id))]
    async fn delete(&mut self, id: &FileId) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "idempotency_keys", db.operation = "insert"))]
    async fn claim_idempotency_key(
        &mut self,
        owner: &OwnerId,
        key: &IdempotencyKey,
        candidate: &FileId,
    ) -> Result<Claim, AppError> {
        // Concurrent claimers block on the key's unique index until the winner's
        // transaction ends, then fall through to the SELECT.
        let inserted: Option<String> = sqlx::query_scalar(
            "INSERT INTO idempotency_keys (owner_id, key, file_id) VALUES ($1, $2, $3) \
             ON CONFLICT (owner_id, key) DO NOTHING RETURNING file_id",
        )
        .bind(owner.as_str())
        .bind(key.as_str())
        .bind(candidate.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        if inserted.is_some() {
            return Ok(Claim::Claimed);
        }

        let existing: Option<String> = sqlx::query_scalar(
            "SELECT file_id FROM idempotency_keys WHERE owner_id = $1 AND key = $2",
        )
        .bind(owner.as_str())
        .bind(key.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        match existing {
            Some(id) => {
                let id = FileId::parse(&id)
                    .map_err(|e| AppError::Internal(format!("Corrupt idempotency row: {}", e)))?;
                Ok(Claim::AlreadyClaimed(id))
            }
            None => Err(AppError::Conflict(format!(
                "Idempotency key {} changed during claim",
                key
            ))),
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
