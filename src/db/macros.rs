//! Database dispatch macros for reducing code duplication.
//!
//! The pool and transaction wrappers hold one variant per backend, and most
//! operations run the same code against each. These macros expand that code
//! once per variant at compile time, so each arm is type-checked against its
//! own driver types.

/// Run the same body against whichever backend variant a value holds.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(self, DbPool, |pool| pool.close().await)
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($value:expr, $enum:ident, |$inner:ident| $body:expr) => {
        match $value {
            $enum::MySql($inner) => $body,
            $enum::Postgres($inner) => $body,
            $enum::SQLite($inner) => $body,
        }
    };
}

pub use impl_db_dispatch;
