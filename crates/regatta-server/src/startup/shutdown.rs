//! Graceful shutdown handling for the Regatta server

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Process-wide shutdown signal
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger shutdown
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once shutdown has been triggered, including before the call
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }

    /// Token for a component that must stop with the process
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}

/// Listen for Ctrl+C or SIGTERM in the background
///
/// Returns the signal that fires when either arrives
pub fn wait_for_shutdown_signal() -> ShutdownSignal {
    let shutdown = ShutdownSignal::new();
    let shutdown_clone = shutdown.clone();

    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C, initiating graceful shutdown...");
            }
            _ = terminate => {
                info!("Received SIGTERM, initiating graceful shutdown...");
            }
        }

        shutdown_clone.shutdown();
    });

    shutdown
}

/// Run a shutdown step to completion, warning once if it outlasts `after`
pub async fn warn_if_slow<F>(step: &str, after: Duration, future: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(future);
    tokio::select! {
        () = &mut future => return,
        () = tokio::time::sleep(after) => {
            warn!(step, ?after, "Shutdown step is taking longer than expected");
        }
    }
    future.await;
}
