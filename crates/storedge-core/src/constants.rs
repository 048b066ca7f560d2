//! Default limits and fixed field bounds.

/// Default maximum upload size (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: i64 = 10 * 1024 * 1024;

/// Default maximum number of tags per file.
pub const DEFAULT_MAX_TAGS_PER_FILE: usize = 16;

/// Default maximum display-name length, in Unicode code points.
pub const DEFAULT_MAX_NAME_LEN: usize = 255;

/// Length of a canonical file identifier.
pub const FILE_ID_LEN: usize = 26;

pub const TAG_MAX_LEN: usize = 32;
pub const OWNER_ID_MAX_LEN: usize = 34;
pub const IDEMPOTENCY_KEY_MAX_LEN: usize = 64;

/// Page size used when a listing request asks for 0 items.
pub const DEFAULT_LIST_LIMIT: u32 = 50;

/// Largest page a listing request may ask for.
pub const MAX_LIST_LIMIT: u32 = 100;

/// Copy buffer used when streaming uploads into the object store.
pub const STREAM_BUFFER_SIZE: usize = 64 * 1024;

/// Default upload deadline.
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 300;

/// Default age before an unreferenced object is considered an orphan.
pub const DEFAULT_ORPHAN_GRACE_PERIOD_SECS: u64 = 3600;

/// Upper bound for compensation work that runs after a request has failed.
pub const CLEANUP_TIMEOUT_SECS: u64 = 30;
