//! Connection pool and transaction wrappers.
//!
//! This module uses database-specific pools (MySqlPool, PgPool, SqlitePool)
//! rather than `AnyPool` so each driver keeps its full type support.
//!
//! Transactions are driven with explicit `BEGIN` / `COMMIT` / `ROLLBACK`
//! statements on a dedicated pooled connection. Unlike `sqlx::Transaction`,
//! this keeps the connection usable after a failed `COMMIT`, so the caller
//! can issue the compensating rollback itself.

use crate::config::PoolOptions;
use crate::db::{DbError, DbResult};
use crate::models::{DatabaseType, mask_connection_string};
use sqlx::pool::PoolConnection;
use sqlx::{
    Connection, Database, Executor, MySql, MySqlPool, PgPool, Postgres, Sqlite, SqlitePool,
    mysql::MySqlConnectOptions, sqlite::SqliteConnectOptions,
};
use std::str::FromStr;
use tracing::warn;

/// Database-specific connection pool.
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    SQLite(SqlitePool),
}

/// Apply the service pool options to a driver pool builder.
fn driver_pool_options<DB: Database>(options: &PoolOptions) -> sqlx::pool::PoolOptions<DB> {
    sqlx::pool::PoolOptions::<DB>::new()
        .max_connections(options.max_open_connections)
        .min_connections(options.max_idle_connections)
        .max_lifetime(options.max_connection_lifetime)
        .idle_timeout(options.idle_timeout)
        .acquire_timeout(options.acquire_timeout)
        .test_before_acquire(options.test_before_acquire)
}

impl DbPool {
    /// Create a connection pool for the given connection string.
    pub async fn connect(connection_string: &str, options: &PoolOptions) -> DbResult<Self> {
        let db_type = DatabaseType::from_connection_string(connection_string).ok_or_else(|| {
            DbError::UnsupportedDatabase(mask_connection_string(connection_string))
        })?;

        let pool = match db_type {
            DatabaseType::MySQL => {
                let connect_options =
                    MySqlConnectOptions::from_str(connection_string)?.charset("utf8mb4");
                DbPool::MySql(
                    driver_pool_options::<MySql>(options)
                        .connect_with(connect_options)
                        .await?,
                )
            }
            DatabaseType::PostgreSQL => DbPool::Postgres(
                driver_pool_options::<Postgres>(options)
                    .connect(connection_string)
                    .await?,
            ),
            DatabaseType::SQLite => {
                let connect_options = SqliteConnectOptions::from_str(connection_string)?;
                DbPool::SQLite(
                    driver_pool_options::<Sqlite>(options)
                        .connect_with(connect_options)
                        .await?,
                )
            }
        };

        Ok(pool)
    }

    /// Get the database type for this pool.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbPool::MySql(_) => DatabaseType::MySQL,
            DbPool::Postgres(_) => DatabaseType::PostgreSQL,
            DbPool::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// Acquire a connection and check that the server answers.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        impl_db_dispatch!(self, DbPool, |pool| pool.acquire().await?.ping().await)
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        impl_db_dispatch!(self, DbPool, |pool| pool.close().await)
    }

    pub fn is_closed(&self) -> bool {
        impl_db_dispatch!(self, DbPool, |pool| pool.is_closed())
    }

    /// Acquire a dedicated connection and open a transaction on it.
    pub async fn begin(&self) -> Result<DbTransaction, sqlx::Error> {
        let conn = match self {
            DbPool::MySql(pool) => TxConnection::MySql(pool.acquire().await?),
            DbPool::Postgres(pool) => TxConnection::Postgres(pool.acquire().await?),
            DbPool::SQLite(pool) => TxConnection::SQLite(pool.acquire().await?),
        };
        let mut tx = DbTransaction {
            conn,
            finished: false,
        };
        tx.run("BEGIN").await?;
        Ok(tx)
    }
}

#[derive(Debug)]
enum TxConnection {
    MySql(PoolConnection<MySql>),
    Postgres(PoolConnection<Postgres>),
    SQLite(PoolConnection<Sqlite>),
}

/// An open transaction holding its own pooled connection.
///
/// The connection goes back to the pool only after a successful `COMMIT`
/// or `ROLLBACK`. A handle dropped in any other state closes its
/// connection, so the server discards the session and whatever it held.
#[derive(Debug)]
pub struct DbTransaction {
    conn: TxConnection,
    finished: bool,
}

impl DbTransaction {
    /// Get the database type for this transaction.
    pub fn db_type(&self) -> DatabaseType {
        match self.conn {
            TxConnection::MySql(_) => DatabaseType::MySQL,
            TxConnection::Postgres(_) => DatabaseType::PostgreSQL,
            TxConnection::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// Execute SQL inside the transaction, returning the rows affected.
    pub async fn execute(&mut self, sql: &str) -> Result<u64, sqlx::Error> {
        impl_db_dispatch!(&mut self.conn, TxConnection, |conn| {
            Executor::execute(&mut **conn, sql)
                .await
                .map(|result| result.rows_affected())
        })
    }

    pub(crate) async fn commit(&mut self) -> Result<(), sqlx::Error> {
        self.run("COMMIT").await?;
        self.finished = true;
        Ok(())
    }

    pub(crate) async fn rollback(&mut self) -> Result<(), sqlx::Error> {
        self.run("ROLLBACK").await?;
        self.finished = true;
        Ok(())
    }

    /// Give up on a transaction whose server-side state is unknown.
    pub(crate) fn abandon(self) {
        warn!(db_type = %self.db_type(), "Abandoning transaction, closing its connection");
        drop(self);
    }

    async fn run(&mut self, statement: &'static str) -> Result<(), sqlx::Error> {
        self.execute(statement).await.map(|_| ())
    }
}

impl Drop for DbTransaction {
    fn drop(&mut self) {
        if !self.finished {
            impl_db_dispatch!(&mut self.conn, TxConnection, |conn| conn.close_on_drop());
        }
    }
}
