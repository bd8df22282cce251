//! HTTP API of the backend service.
//!
//! Routes are grouped under `/api/v1`. Every route shares the same
//! middleware stack: request tracing and a per-request timeout.

pub mod health;

pub use health::{HealthState, LivenessCheck, health_check, run_checks};

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Path of the health-check endpoint.
pub const HEALTH_CHECK_PATH: &str = "/api/v1/healthcheck";

/// Build the application router.
///
/// `checks` are probed by the health endpoint in the given order.
pub fn build_router(checks: Vec<Arc<dyn LivenessCheck>>, request_timeout: Duration) -> Router {
    let v1 = Router::new()
        .route("/healthcheck", get(health_check))
        .with_state(HealthState::new(checks));

    Router::new()
        .nest("/api/v1", v1)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
}
