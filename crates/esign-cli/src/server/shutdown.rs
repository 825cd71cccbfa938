//! Graceful shutdown signal handling.

use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix;
use tokio_util::sync::CancellationToken;

use crate::TRACING_TARGET_SERVER_SHUTDOWN;

/// Waits for SIGTERM (Unix) or SIGINT/Ctrl+C.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            tracing::error!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                error = %e,
                "Failed to install Ctrl+C handler"
            );
            std::future::pending::<()>().await;
        } else {
            tracing::info!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                "Received Ctrl+C signal, initiating graceful shutdown"
            );
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match unix::signal(unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                tracing::info!(
                    target: TRACING_TARGET_SERVER_SHUTDOWN,
                    "Received SIGTERM signal, initiating graceful shutdown"
                );
            }
            Err(e) => {
                tracing::error!(
                    target: TRACING_TARGET_SERVER_SHUTDOWN,
                    error = %e,
                    "Failed to install SIGTERM handler"
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

/// Returns a token cancelled once a shutdown signal arrives.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let signal_token = token.clone();

    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    token
}
