//! StorEdge Storage Library
//!
//! This crate provides the object store abstraction used by the upload pipeline and
//! its local filesystem and in-memory implementations.
//!
//! # Object lifecycle
//!
//! Uploads are written to a temp object (`tmp/{id}`), then promoted to a permanent
//! object (`objects/{shard}/{id}`) with rename semantics. Only committed objects are
//! ever referenced by the catalog.
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module so all backends stay consistent.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use factory::create_object_store;
#[cfg(feature = "storage-local")]
pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;
pub use storedge_core::StorageBackend;
pub use traits::{
    ByteRange, ObjectBody, ObjectReader, ObjectStore, StorageError, StorageResult,
    StoredObject, TempObject, TempRef, TempWriter,
};
