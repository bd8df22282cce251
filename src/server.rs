//! HTTP server lifecycle with graceful shutdown.
//!
//! The server moves through `Starting -> Listening -> ShuttingDown -> Stopped`.
//! The listener runs on its own task while the calling task waits for a
//! shutdown signal; that wait is the only point where the two meet. Once the
//! signal arrives the listener is asked to drain and, concurrently, every
//! registered cleanup callback runs exactly once. Both share one deadline.

use crate::error::BoxError;
use axum::Router;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Default time budget for the listener to drain in-flight requests.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Teardown action registered at startup and invoked once during shutdown.
pub type CleanupFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), BoxError>> + Send>;

/// Lifecycle state of a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Starting,
    Listening,
    ShuttingDown,
    Stopped,
}

/// Fatal server conditions. Any of these should terminate the process.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server exited with a fatal error: {0}")]
    Listener(#[source] std::io::Error),

    #[error("Failed to gracefully shut down the server within {}s", .0.as_secs_f64())]
    ShutdownTimeout(Duration),
}

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Aggregate of every cleanup callback failure from one shutdown.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", .failures.join(", "))]
pub struct CleanupError {
    failures: Vec<String>,
}

impl CleanupError {
    pub fn failures(&self) -> &[String] {
        &self.failures
    }
}

/// Outcome of a completed graceful shutdown.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Set when one or more cleanup callbacks failed. Never fatal.
    pub cleanup_error: Option<CleanupError>,
}

/// HTTP server with signal-driven graceful shutdown.
pub struct Server {
    name: String,
    router: Router,
    cleanups: Vec<CleanupFn>,
    shutdown_timeout: Duration,
    state: watch::Sender<ServerState>,
}

impl Server {
    /// Create a new server for the given router.
    pub fn new(name: impl Into<String>, router: Router) -> Self {
        let (state, _) = watch::channel(ServerState::Starting);
        Self {
            name: name.into(),
            router,
            cleanups: Vec::new(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            state,
        }
    }

    /// Set the shared time budget for draining the listener and running cleanups.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Register a cleanup callback. Callbacks run in registration order.
    pub fn on_shutdown<F, Fut>(mut self, cleanup: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.cleanups.push(Box::new(move || cleanup().boxed()));
        self
    }

    /// Watch the lifecycle state.
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Bind `addr` and serve until SIGINT or SIGTERM, then shut down gracefully.
    pub async fn start(self, addr: &str) -> ServerResult<ShutdownReport> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        self.serve(listener, wait_for_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> ServerResult<ShutdownReport>
    where
        F: Future<Output = ()> + Send,
    {
        let Server {
            name,
            router,
            cleanups,
            shutdown_timeout,
            state,
        } = self;

        let local_addr: Option<SocketAddr> = listener.local_addr().ok();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let mut listener_task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.await;
                })
                .await
        });

        state.send_replace(ServerState::Listening);
        info!(server = %name, addr = ?local_addr, "Server listening");

        tokio::select! {
            joined = &mut listener_task => {
                state.send_replace(ServerState::Stopped);
                let err = match joined {
                    Ok(Ok(())) => std::io::Error::other("listener stopped before shutdown was requested"),
                    Ok(Err(e)) => e,
                    Err(e) => std::io::Error::other(e),
                };
                error!(server = %name, error = %err, "HTTP server exited with a fatal error");
                return Err(ServerError::Listener(err));
            }
            _ = shutdown => {
                info!(server = %name, "Shut down signal received");
            }
        }

        state.send_replace(ServerState::ShuttingDown);
        let _ = stop_tx.send(());

        let deadline = Instant::now() + shutdown_timeout;
        let drain = tokio::time::timeout_at(deadline, &mut listener_task);
        let (drained, cleanup) = tokio::join!(drain, run_cleanups(cleanups, deadline));

        if let Err(e) = &cleanup {
            error!(server = %name, error = %e, "Failed to clean up properly after shutdown");
        }

        let result = match drained {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(ServerError::Listener(e)),
            Ok(Err(e)) => Err(ServerError::Listener(std::io::Error::other(e))),
            Err(_) => {
                listener_task.abort();
                Err(ServerError::ShutdownTimeout(shutdown_timeout))
            }
        };
        state.send_replace(ServerState::Stopped);

        if let Err(e) = result {
            error!(server = %name, error = %e, "Failed to gracefully shut down the server");
            return Err(e);
        }

        info!(server = %name, "Server shut down gracefully");
        Ok(ShutdownReport {
            cleanup_error: cleanup.err(),
        })
    }
}

/// Run every cleanup callback once, in order, collecting failures.
///
/// A callback still running at `deadline` is dropped and counted as failed.
async fn run_cleanups(cleanups: Vec<CleanupFn>, deadline: Instant) -> Result<(), CleanupError> {
    let mut failures = Vec::new();
    for (index, cleanup) in cleanups.into_iter().enumerate() {
        match tokio::time::timeout_at(deadline, cleanup()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(index, error = %e, "Cleanup callback failed");
                failures.push(e.to_string());
            }
            Err(_) => {
                warn!(index, "Cleanup callback did not finish before the shutdown deadline");
                failures.push(format!("cleanup callback {index} timed out"));
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(CleanupError { failures })
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
