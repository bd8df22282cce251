//! Backend Service Library
//!
//! This library provides the building blocks of a small HTTP backend: a
//! connect-once SQL client with transaction helpers, a uniform API error
//! type, a health-check endpoint and a server with graceful shutdown.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod server;

pub use config::Config;
pub use db::{DatabaseClient, SqlDatabase};
pub use error::{ApiError, ApiResult, ErrorKind};
pub use server::{Server, ServerError};
