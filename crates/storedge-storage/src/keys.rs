//! Shared key generation for storage backends.
//!
//! Temp objects live at `tmp/{id}`; committed objects at `objects/{shard}/{id}`, where
//! the shard is the last two characters of the id (the random part of a ULID).

use storedge_core::FileId;

pub const TEMP_PREFIX: &str = "tmp";
pub const OBJECT_PREFIX: &str = "objects";

pub fn temp_key(id: &FileId) -> String {
    format!("{}/{}", TEMP_PREFIX, id)
}

pub fn object_key(id: &FileId) -> String {
    let s = id.as_str();
    format!("{}/{}/{}", OBJECT_PREFIX, &s[s.len() - 2..], s)
}
