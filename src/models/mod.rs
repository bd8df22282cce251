//! Data models for the backend service.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod health;

// Re-export commonly used types
pub use connection::{DatabaseType, mask_connection_string};
pub use health::HealthCheckResponse;
