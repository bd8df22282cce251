//! Database client layer.
//!
//! This module provides:
//! - The [`DatabaseClient`] capability trait
//! - Database-specific connection pools and transaction wrappers
//! - [`SqlDatabase`], the connect-once production client
//! - [`MockDatabase`], a scripted in-memory client for tests

#[macro_use]
pub mod macros;
pub mod client;
pub mod mock;
pub mod pool;

pub use client::SqlDatabase;
pub use mock::{MockDatabase, MockStats, MockTransaction};
pub use pool::{DbPool, DbTransaction};

use crate::error::ApiResult;
use std::future::Future;
use thiserror::Error;

pub(crate) const BEGIN_FAILED: &str = "error occurred while begin DB Transaction";
pub(crate) const COMMIT_FAILED: &str = "commit failed for DB transaction";
pub(crate) const ROLLBACK_AFTER_COMMIT_FAILED: &str = "rollback failed after unsuccessful commit";
pub(crate) const ROLLBACK_FAILED: &str = "rollback failed";

/// Errors raised by the connection handle itself (ping, close, pool setup).
#[derive(Error, Debug)]
pub enum DbError {
    #[error("database is not connected")]
    NotConnected,

    #[error("database connection is already closed")]
    AlreadyClosed,

    #[error("unsupported database type in connection string: {0}")]
    UnsupportedDatabase(String),

    #[error("{0}")]
    Unavailable(String),

    #[error(transparent)]
    Driver(#[from] sqlx::Error),
}

/// Result type alias for connection handle operations.
pub type DbResult<T> = Result<T, DbError>;

/// Capability interface over a pooled, transactional database handle.
///
/// Terminal transaction calls take the handle by value, so a committed or
/// rolled-back transaction cannot be used again:
///
/// ```compile_fail
/// # use backend_service::db::{DatabaseClient, MockDatabase};
/// # async fn reuse(db: MockDatabase) {
/// let tx = db.begin_transaction().await.unwrap();
/// db.commit_transaction(tx).await.unwrap();
/// db.commit_transaction(tx).await.unwrap();
/// # }
/// ```
pub trait DatabaseClient: Send + Sync {
    /// Open unit of work handed out by `begin_transaction`.
    type Transaction: Send;

    /// Set up the connection handle.
    ///
    /// Only the first call performs real work. Concurrent and later callers
    /// wait for that attempt and all observe its outcome. There is no retry.
    fn connect(&self, connection_string: &str) -> impl Future<Output = ApiResult<()>> + Send;

    /// Liveness probe. Returns the raw probe failure.
    fn ping(&self) -> impl Future<Output = DbResult<()>> + Send;

    /// Release the pooled handle. Not idempotent; call at most once.
    fn close(&self) -> impl Future<Output = DbResult<()>> + Send;

    fn begin_transaction(&self) -> impl Future<Output = ApiResult<Self::Transaction>> + Send;

    /// Commit, attempting one compensating rollback if the commit fails.
    fn commit_transaction(
        &self,
        tx: Self::Transaction,
    ) -> impl Future<Output = ApiResult<()>> + Send;

    fn rollback_transaction(
        &self,
        tx: Self::Transaction,
    ) -> impl Future<Output = ApiResult<()>> + Send;
}
