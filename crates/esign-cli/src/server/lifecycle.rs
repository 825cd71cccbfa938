//! Server lifecycle management.
//!
//! Runs the server future until it completes, or until the shutdown timeout
//! elapses after a shutdown signal, and logs the outcome.

use std::future::Future;
use std::io;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::server::{Result, ServerError};
use crate::{TRACING_TARGET_SERVER_SHUTDOWN, TRACING_TARGET_SERVER_STARTUP};

/// Serves with lifecycle management and a bounded graceful shutdown.
///
/// `serve_fn` must stop accepting connections once `shutdown` is cancelled.
/// In-flight requests then get `shutdown_timeout` to finish.
pub async fn serve_with_shutdown<F>(
    server_config: &ServerConfig,
    shutdown: CancellationToken,
    serve_fn: impl FnOnce() -> F,
) -> Result<()>
where
    F: Future<Output = io::Result<()>>,
{
    let start_time = Instant::now();
    log_security_warnings(server_config);

    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        addr = %server_config.server_addr(),
        "Server is ready and listening for connections"
    );

    let shutdown_timeout = server_config.shutdown_timeout();
    let drain_deadline = async {
        shutdown.cancelled().await;
        tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            timeout_secs = shutdown_timeout.as_secs(),
            "Graceful shutdown initiated"
        );
        tokio::time::sleep(shutdown_timeout).await;
    };

    let result = tokio::select! {
        result = serve_fn() => result,
        () = drain_deadline => {
            tracing::warn!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                timeout_secs = shutdown_timeout.as_secs(),
                "Shutdown timeout elapsed, dropping open connections"
            );
            Ok(())
        }
    };

    handle_result(result, start_time)
}

fn log_security_warnings(config: &ServerConfig) {
    if config.binds_to_all_interfaces() {
        tracing::warn!(
            target: TRACING_TARGET_SERVER_STARTUP,
            "Server bound to all interfaces - ensure firewall is configured"
        );
    }
}

fn handle_result(result: io::Result<()>, start_time: Instant) -> Result<()> {
    let uptime = start_time.elapsed();

    match result {
        Ok(()) => {
            tracing::info!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                uptime_secs = uptime.as_secs(),
                "Shutdown completed"
            );
            Ok(())
        }
        Err(err) => {
            let err = ServerError::Runtime(err);
            tracing::error!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                error = %err,
                code = err.error_code(),
                suggestion = err.suggestion(),
                uptime_secs = uptime.as_secs(),
                "Fatal error"
            );
            Err(err)
        }
    }
}
