//! Opaque pagination cursors
//!
//! A cursor names the last item of a page by its `(created_at, id)` sort key, encoded
//! as base64url (no padding) of `"{micros}:{id}"`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use storedge_core::{AppError, FieldName, File, FileId, Reason};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub id: FileId,
}

impl Cursor {
    /// Cursor positioned just after `file`.
    pub fn after(file: &File) -> Self {
        Self {
            created_at: file.created_at(),
            id: file.id().clone(),
        }
    }

    pub fn encode(&self) -> String {
        let raw = format!("{}:{}", self.created_at.timestamp_micros(), self.id);
        URL_SAFE_NO_PAD.encode(raw)
    }

    pub fn decode(encoded: &str) -> Result<Self, AppError> {
        let bad = || AppError::invalid(FieldName::Cursor, Reason::BadFormat);

        let bytes = URL_SAFE_NO_PAD.decode(encoded.trim()).map_err(|_| bad())?;
        let raw = String::from_utf8(bytes).map_err(|_| bad())?;
        let (micros, id) = raw.split_once(':').ok_or_else(bad)?;

        let micros: i64 = micros.parse().map_err(|_| bad())?;
        let created_at = DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(bad)?;
        let id = FileId::parse(id).map_err(|_| bad())?;

        Ok(Self { created_at, id })
    }

    /// True when `file` sorts strictly after this cursor.
    pub fn precedes(&self, file: &File) -> bool {
        (file.created_at(), file.id()) > (self.created_at, &self.id)
    }
}
