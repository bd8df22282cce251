//! Health-check response model.

use serde::{Deserialize, Serialize};

/// Whether the service is healthy, or which underlying check failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// True if all the checks passed.
    pub healthy: bool,
    /// Message of the first failing check; empty when healthy.
    pub error: String,
}

impl HealthCheckResponse {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            error: String::new(),
        }
    }

    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            healthy: false,
            error: error.into(),
        }
    }
}
