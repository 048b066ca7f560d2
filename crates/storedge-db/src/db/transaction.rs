//! Transaction utilities
//!
//! `run_atomic` gives a closure all-or-nothing effect across catalog writes.

use std::future::Future;
use std::pin::Pin;

use storedge_core::AppError;

use super::catalog::{CatalogTransaction, TransactionCoordinator};

/// What to do with the transaction once the closure returns.
#[derive(Debug)]
pub enum TxOutcome<T> {
    Commit(T),
    Rollback(T),
}

/// Execute a closure within a catalog transaction
///
/// Commits on `TxOutcome::Commit`, rolls back on `TxOutcome::Rollback` or on error.
/// Rollback failures are logged; the closure's own error is what the caller sees.
///
/// # Example
///
/// ```ignore
/// let created = run_atomic(coordinator, |tx| {
///     Box::pin(async move {
///         tx.create(&file).await?;
///         Ok(TxOutcome::Commit(()))
///     })
/// })
/// .await?;
/// ```
pub async fn run_atomic<T, F>(coordinator: &dyn TransactionCoordinator, f: F) -> Result<T, AppError>
where
    F: for<'a> FnOnce(
        &'a mut dyn CatalogTransaction,
    ) -> Pin<Box<dyn Future<Output = Result<TxOutcome<T>, AppError>> + Send + 'a>>,
{
    let mut tx = coordinator.begin().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to begin transaction");
        e
    })?;

    match f(tx.as_mut()).await {
        Ok(TxOutcome::Commit(value)) => {
            tx.commit().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to commit transaction");
                e
            })?;
            Ok(value)
        }
        Ok(TxOutcome::Rollback(value)) => {
            tx.rollback().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to roll back transaction");
                e
            })?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(
                    error = %rollback_err,
                    original_error = %err,
                    "Failed to roll back transaction after error"
                );
            }
            Err(err)
        }
    }
}
