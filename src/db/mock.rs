//! Scripted in-memory [`DatabaseClient`].
//!
//! `MockDatabase` follows the same connect-once and commit/rollback rules as
//! [`SqlDatabase`](crate::db::SqlDatabase), but every failure is chosen up
//! front by the test. Counters record what the code under test did.

use crate::api::LivenessCheck;
use crate::db::{
    BEGIN_FAILED, COMMIT_FAILED, DatabaseClient, DbError, DbResult, ROLLBACK_AFTER_COMMIT_FAILED,
    ROLLBACK_FAILED,
};
use crate::error::{ApiError, ApiResult, BoxError, ErrorKind};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::OnceCell;

/// Snapshot of the mock's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockStats {
    pub connect_attempts: usize,
    pub begun: usize,
    pub committed: usize,
    pub rolled_back: usize,
    /// Transactions left in an unknown state after a failed terminal call
    pub abandoned: usize,
    /// Handles dropped without commit or rollback
    pub dropped_open: usize,
}

#[derive(Debug, Default)]
struct Counters {
    connect_attempts: AtomicUsize,
    begun: AtomicUsize,
    committed: AtomicUsize,
    rolled_back: AtomicUsize,
    abandoned: AtomicUsize,
    dropped_open: AtomicUsize,
}

/// Transaction handle issued by [`MockDatabase`].
///
/// Dropping a handle that was never committed or rolled back is counted in
/// [`MockStats::dropped_open`].
#[derive(Debug)]
pub struct MockTransaction {
    id: u64,
    finished: bool,
    counters: Arc<Counters>,
}

impl MockTransaction {
    pub fn id(&self) -> u64 {
        self.id
    }

    fn finish(mut self, counter: fn(&Counters) -> &AtomicUsize) {
        self.finished = true;
        counter(&self.counters).fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for MockTransaction {
    fn drop(&mut self) {
        if !self.finished {
            self.counters.dropped_open.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[derive(Debug, Default)]
pub struct MockDatabase {
    connect_failure: Option<String>,
    ping_failure: Option<String>,
    fail_begin: bool,
    fail_commit: bool,
    fail_rollback: bool,

    connected: OnceCell<ApiResult<()>>,
    closed: AtomicBool,
    next_id: AtomicU64,
    counters: Arc<Counters>,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `connect` fail with the given driver message.
    pub fn with_connect_failure(mut self, message: impl Into<String>) -> Self {
        self.connect_failure = Some(message.into());
        self
    }

    /// Make `ping` fail with the given message.
    pub fn with_ping_failure(mut self, message: impl Into<String>) -> Self {
        self.ping_failure = Some(message.into());
        self
    }

    pub fn with_begin_failure(mut self) -> Self {
        self.fail_begin = true;
        self
    }

    pub fn with_commit_failure(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn with_rollback_failure(mut self) -> Self {
        self.fail_rollback = true;
        self
    }

    pub fn stats(&self) -> MockStats {
        let c = &self.counters;
        MockStats {
            connect_attempts: c.connect_attempts.load(Ordering::SeqCst),
            begun: c.begun.load(Ordering::SeqCst),
            committed: c.committed.load(Ordering::SeqCst),
            rolled_back: c.rolled_back.load(Ordering::SeqCst),
            abandoned: c.abandoned.load(Ordering::SeqCst),
            dropped_open: c.dropped_open.load(Ordering::SeqCst),
        }
    }

    fn ensure_connected(&self) -> DbResult<()> {
        match self.connected.get() {
            Some(Ok(())) => Ok(()),
            _ => Err(DbError::NotConnected),
        }
    }

    async fn attempt_connect(&self) -> ApiResult<()> {
        self.counters.connect_attempts.fetch_add(1, Ordering::SeqCst);
        // Give concurrent callers a chance to pile up behind the attempt.
        tokio::task::yield_now().await;
        match &self.connect_failure {
            Some(message) => Err(ApiError::new(
                ErrorKind::InternalServerError,
                [format!("failed to connect: {message}")],
            )),
            None => Ok(()),
        }
    }
}

impl DatabaseClient for MockDatabase {
    type Transaction = MockTransaction;

    async fn connect(&self, _connection_string: &str) -> ApiResult<()> {
        self.connected
            .get_or_init(|| self.attempt_connect())
            .await
            .clone()
    }

    async fn ping(&self) -> DbResult<()> {
        self.ensure_connected()?;
        if self.closed.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable("pool closed".to_string()));
        }
        match &self.ping_failure {
            Some(message) => Err(DbError::Unavailable(message.clone())),
            None => Ok(()),
        }
    }

    async fn close(&self) -> DbResult<()> {
        self.ensure_connected()?;
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(DbError::AlreadyClosed);
        }
        Ok(())
    }

    async fn begin_transaction(&self) -> ApiResult<MockTransaction> {
        let usable = self.ensure_connected().is_ok() && !self.closed.load(Ordering::SeqCst);
        if !usable || self.fail_begin {
            return Err(ApiError::internal(BEGIN_FAILED));
        }
        self.counters.begun.fetch_add(1, Ordering::SeqCst);
        Ok(MockTransaction {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            finished: false,
            counters: Arc::clone(&self.counters),
        })
    }

    async fn commit_transaction(&self, tx: MockTransaction) -> ApiResult<()> {
        if !self.fail_commit {
            tx.finish(|c| &c.committed);
            return Ok(());
        }
        if self.fail_rollback {
            tx.finish(|c| &c.abandoned);
            return Err(ApiError::internal(ROLLBACK_AFTER_COMMIT_FAILED));
        }
        tx.finish(|c| &c.rolled_back);
        Err(ApiError::internal(COMMIT_FAILED))
    }

    async fn rollback_transaction(&self, tx: MockTransaction) -> ApiResult<()> {
        if self.fail_rollback {
            tx.finish(|c| &c.abandoned);
            return Err(ApiError::internal(ROLLBACK_FAILED));
        }
        tx.finish(|c| &c.rolled_back);
        Ok(())
    }
}

#[async_trait]
impl LivenessCheck for MockDatabase {
    async fn check(&self) -> Result<(), BoxError> {
        DatabaseClient::ping(self).await.map_err(BoxError::from)
    }

    fn name(&self) -> &str {
        "mock database"
    }
}
