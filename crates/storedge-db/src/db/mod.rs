//! Catalog repositories
//!
//! `catalog` defines the ports the services depend on; `postgres` and `memory` are the
//! two implementations. Both implement `Catalog` and `TransactionCoordinator` on the
//! same value so reads and transactional writes share one backing store.

pub mod catalog;
pub mod cursor;
pub mod memory;
pub mod postgres;
pub mod transaction;

pub use catalog::{Catalog, CatalogTransaction, Claim, ListQuery, Page, TransactionCoordinator};
pub use cursor::Cursor;
pub use memory::MemoryCatalog;
pub use postgres::{setup_database, PgCatalog};
pub use transaction::{run_atomic, TxOutcome};
