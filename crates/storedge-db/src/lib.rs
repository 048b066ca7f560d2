//! StorEdge catalog layer
//!
//! Catalog and transaction ports, the `run_atomic` helper, cursor encoding, and the
//! Postgres and in-memory adapters.

pub mod db;

pub use db::{
    run_atomic, setup_database, Catalog, CatalogTransaction, Claim, Cursor, ListQuery,
    MemoryCatalog, Page, PgCatalog, TransactionCoordinator, TxOutcome,
};
