use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, FieldName, Reason};
use crate::validation::fields::{sanitize_name, validate_content_type};

use super::ids::{Checksum, FileId, OwnerId, StorageRef, Tag};
use super::upload::{Limits, UploadSpec};

/// A stored file. Immutable, and valid by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FileRecord", into = "FileRecord")]
pub struct File {
    id: FileId,
    name: String,
    size: u64,
    content_type: String,
    checksum: Checksum,
    created_at: DateTime<Utc>,
    owner_id: OwnerId,
    tags: Vec<Tag>,
    storage_ref: StorageRef,
}

/// Unvalidated wire/storage shape of a `File`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub size: i64,
    pub content_type: String,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
    pub owner_id: String,
    pub tags: Vec<String>,
    pub storage_ref: String,
}

impl File {
    /// Build a `File` for freshly committed content.
    ///
    /// `spec` is validated again against `limits`.
    pub fn new(
        spec: &UploadSpec,
        id: FileId,
        checksum: Checksum,
        created_at: DateTime<Utc>,
        storage_ref: StorageRef,
        limits: &Limits,
    ) -> Result<Self, AppError> {
        let upload = spec.validate(limits)?;
        let created_at = normalize_created_at(created_at)?;

        Ok(File {
            id,
            name: upload.name,
            size: upload.size,
            content_type: upload.content_type,
            checksum,
            created_at,
            owner_id: upload.owner_id,
            tags: upload.tags,
            storage_ref,
        })
    }

    /// Rebuild a `File` from a persisted record.
    ///
    /// Every field rule applies except the deployment's name length bound, which may
    /// have changed since the record was written.
    pub fn restore(record: FileRecord) -> Result<Self, AppError> {
        let id = FileId::parse(&record.id)?;
        let name = sanitize_name(&record.name, usize::MAX)?;
        if record.size <= 0 {
            return Err(AppError::invalid(FieldName::Size, Reason::TooSmall));
        }
        validate_content_type(&record.content_type)?;
        let checksum = Checksum::parse(&record.checksum)?;
        let created_at = normalize_created_at(record.created_at)?;
        let owner_id = OwnerId::parse(&record.owner_id)?;

        let mut tags: Vec<Tag> = Vec::with_capacity(record.tags.len());
        for raw in &record.tags {
            let tag = Tag::parse(raw)?;
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        let storage_ref = StorageRef::parse(&record.storage_ref)?;

        Ok(File {
            id,
            name,
            size: record.size as u64,
            content_type: record.content_type,
            checksum,
            created_at,
            owner_id,
            tags,
            storage_ref,
        })
    }

    pub fn id(&self) -> &FileId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn storage_ref(&self) -> &StorageRef {
        &self.storage_ref
    }

    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }

    pub fn to_record(&self) -> FileRecord {
        FileRecord::from(self.clone())
    }
}

/// Timestamps are kept at microsecond precision, the resolution of both the
/// listing cursor and Postgres `timestamptz`.
fn normalize_created_at(created_at: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
    if created_at == DateTime::<Utc>::default() {
        return Err(AppError::invalid(FieldName::CreatedAt, Reason::Empty));
    }
    Ok(created_at.trunc_subsecs(6))
}

impl From<File> for FileRecord {
    fn from(file: File) -> Self {
        FileRecord {
            id: file.id.into_inner(),
            name: file.name,
            size: file.size as i64,
            content_type: file.content_type,
            checksum: file.checksum.into_inner(),
            created_at: file.created_at,
            owner_id: file.owner_id.into_inner(),
            tags: file.tags.into_iter().map(Tag::into_inner).collect(),
            storage_ref: file.storage_ref.into_inner(),
        }
    }
}

impl TryFrom<FileRecord> for File {
    type Error = AppError;

    fn try_from(record: FileRecord) -> Result<Self, Self::Error> {
        File::restore(record)
    }
}
