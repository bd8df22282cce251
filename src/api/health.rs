//! Health-check controller.

use crate::error::BoxError;
use crate::models::HealthCheckResponse;
use async_trait::async_trait;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use std::sync::Arc;
use tracing::warn;

/// Anything whose liveness can be probed, e.g. a database connection.
#[async_trait]
pub trait LivenessCheck: Send + Sync {
    /// Probe the underlying service. The error message is reported verbatim.
    async fn check(&self) -> Result<(), BoxError>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "dependency"
    }
}

/// Checks run by the health endpoint, in registration order.
#[derive(Clone)]
pub struct HealthState {
    checks: Arc<[Arc<dyn LivenessCheck>]>,
}

impl HealthState {
    pub fn new(checks: Vec<Arc<dyn LivenessCheck>>) -> Self {
        Self {
            checks: checks.into(),
        }
    }
}

/// Run the checks in order and stop at the first failure.
pub async fn run_checks(checks: &[Arc<dyn LivenessCheck>]) -> (StatusCode, HealthCheckResponse) {
    for check in checks {
        if let Err(e) = check.check().await {
            warn!(check = check.name(), error = %e, "Health check failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                HealthCheckResponse::unhealthy(e.to_string()),
            );
        }
    }
    (StatusCode::OK, HealthCheckResponse::healthy())
}

/// `GET /api/v1/healthcheck`
///
/// 200 when every dependency answers, 500 with the first failure otherwise.
pub async fn health_check(
    State(state): State<HealthState>,
) -> (StatusCode, Json<HealthCheckResponse>) {
    let (status, body) = run_checks(&state.checks).await;
    (status, Json(body))
}
