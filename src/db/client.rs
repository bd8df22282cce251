//! Connect-once SQL database client.

use crate::api::LivenessCheck;
use crate::config::PoolOptions;
use crate::db::{
    BEGIN_FAILED, COMMIT_FAILED, DatabaseClient, DbError, DbPool, DbResult, DbTransaction,
    ROLLBACK_AFTER_COMMIT_FAILED, ROLLBACK_FAILED,
};
use crate::error::{ApiError, ApiResult, BoxError, ErrorKind};
use crate::models::{DatabaseType, mask_connection_string};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

/// Production [`DatabaseClient`] backed by a single sqlx pool.
///
/// The pool is created at most once per client. Share the client with
/// `Arc<SqlDatabase>` rather than creating more of them.
#[derive(Debug)]
pub struct SqlDatabase {
    options: PoolOptions,
    /// Outcome of the one real connection attempt.
    pool: OnceCell<ApiResult<DbPool>>,
    closed: AtomicBool,
    connect_attempts: AtomicUsize,
}

impl SqlDatabase {
    pub fn new(options: PoolOptions) -> Self {
        Self {
            options,
            pool: OnceCell::new(),
            closed: AtomicBool::new(false),
            connect_attempts: AtomicUsize::new(0),
        }
    }

    /// Number of real connection attempts made so far (0 or 1).
    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    /// True once `connect` has succeeded.
    pub fn is_connected(&self) -> bool {
        matches!(self.pool.get(), Some(Ok(_)))
    }

    pub fn db_type(&self) -> Option<DatabaseType> {
        self.pool().ok().map(DbPool::db_type)
    }

    /// Get the underlying pool, if connected.
    pub fn pool(&self) -> DbResult<&DbPool> {
        match self.pool.get() {
            Some(Ok(pool)) => Ok(pool),
            _ => Err(DbError::NotConnected),
        }
    }

    async fn create_pool(&self, connection_string: &str) -> ApiResult<DbPool> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);

        info!(
            url = %mask_connection_string(connection_string),
            max_open_connections = self.options.max_open_connections,
            max_idle_connections = self.options.max_idle_connections,
            max_connection_lifetime = ?self.options.max_connection_lifetime,
            "Connecting to database"
        );

        match DbPool::connect(connection_string, &self.options).await {
            Ok(pool) => {
                info!(db_type = %pool.db_type(), "Connected to database");
                Ok(pool)
            }
            Err(e) => {
                error!(error = %e, "Failed to connect to database");
                Err(ApiError::new(
                    ErrorKind::InternalServerError,
                    [format!("failed to connect: {e}")],
                ))
            }
        }
    }
}

impl DatabaseClient for SqlDatabase {
    type Transaction = DbTransaction;

    async fn connect(&self, connection_string: &str) -> ApiResult<()> {
        self.pool
            .get_or_init(|| self.create_pool(connection_string))
            .await
            .as_ref()
            .map(|_| ())
            .map_err(Clone::clone)
    }

    async fn ping(&self) -> DbResult<()> {
        self.pool()?.ping().await.map_err(DbError::from)
    }

    async fn close(&self) -> DbResult<()> {
        let pool = self.pool()?;
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(DbError::AlreadyClosed);
        }
        pool.close().await;
        info!("Database connection pool closed");
        Ok(())
    }

    async fn begin_transaction(&self) -> ApiResult<DbTransaction> {
        let pool = self.pool().map_err(|e| {
            warn!(error = %e, "Cannot begin transaction");
            ApiError::internal(BEGIN_FAILED)
        })?;

        match pool.begin().await {
            Ok(tx) => {
                debug!(db_type = %tx.db_type(), "Transaction started");
                Ok(tx)
            }
            Err(e) => {
                error!(error = %e, "Failed to begin transaction");
                Err(ApiError::internal(BEGIN_FAILED))
            }
        }
    }

    async fn commit_transaction(&self, mut tx: DbTransaction) -> ApiResult<()> {
        let Err(commit_err) = tx.commit().await else {
            debug!("Transaction committed");
            return Ok(());
        };

        warn!(error = %commit_err, "Commit failed, rolling back");
        if let Err(rollback_err) = tx.rollback().await {
            // Server-side state is unknown; drop the session so locks are released.
            error!(
                commit_error = %commit_err,
                rollback_error = %rollback_err,
                "Rollback failed after unsuccessful commit, abandoning transaction"
            );
            tx.abandon();
            return Err(ApiError::internal(ROLLBACK_AFTER_COMMIT_FAILED));
        }
        Err(ApiError::internal(COMMIT_FAILED))
    }

    async fn rollback_transaction(&self, mut tx: DbTransaction) -> ApiResult<()> {
        match tx.rollback().await {
            Ok(()) => {
                debug!("Transaction rolled back");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Rollback failed, abandoning transaction");
                tx.abandon();
                Err(ApiError::internal(ROLLBACK_FAILED))
            }
        }
    }
}

#[async_trait]
impl LivenessCheck for SqlDatabase {
    async fn check(&self) -> Result<(), BoxError> {
        DatabaseClient::ping(self).await.map_err(BoxError::from)
    }

    fn name(&self) -> &str {
        "database"
    }
}
