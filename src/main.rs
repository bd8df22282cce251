//! Backend Service - Main entry point.
//!
//! Connects to the configured database, serves the HTTP API and shuts down
//! gracefully on SIGINT or SIGTERM.

use backend_service::api::{self, LivenessCheck};
use backend_service::config::{self, Config};
use backend_service::db::{DatabaseClient, SqlDatabase};
use backend_service::error::BoxError;
use backend_service::server::Server;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Values from .env must be visible to clap's env fallbacks
    let dotenv_path = config::load_dotenv();
    let config = Config::parse();

    init_tracing(&config);

    info!(
        env = %config.environment,
        dotenv = ?dotenv_path,
        "Starting backend service v{}",
        env!("CARGO_PKG_VERSION")
    );

    config::ensure_environment(&config.env_sample)?;
    let pool_options = config.pool_options()?;

    let db = Arc::new(SqlDatabase::new(pool_options));
    if let Err(e) = db.connect(&config.database_url).await {
        error!(error = %e, "Failed to set up dataservices");
        return Err(e.into());
    }

    let checks: Vec<Arc<dyn LivenessCheck>> = vec![db.clone()];
    let router = api::build_router(checks, config.request_timeout());

    let server = Server::new("backend-service", router)
        .shutdown_timeout(config.shutdown_timeout())
        .on_shutdown(move || async move { db.close().await.map_err(BoxError::from) });

    match server.start(&config.bind_addr()).await {
        // Cleanup failures were already logged by the server; they are not fatal.
        Ok(_) => {
            info!("Server shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Server error");
            std::process::exit(1);
        }
    }
}
