//! HTTP server startup.

use std::future::IntoFuture;

use axum::Router;
use tokio::net::TcpListener;

use crate::TRACING_TARGET_SERVER_STARTUP;
use crate::config::ServerConfig;
use crate::server::lifecycle::serve_with_shutdown;
use crate::server::shutdown::shutdown_token;
use crate::server::{Result, ServerError};

/// Binds the configured address and serves `app` until a shutdown signal.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the address cannot be
/// bound, or the server fails while running.
pub async fn serve_http(app: Router, server_config: ServerConfig) -> Result<()> {
    server_config
        .validate()
        .map_err(|err| ServerError::InvalidConfig(err.to_string()))?;

    let server_addr = server_config.server_addr();
    let listener = TcpListener::bind(server_addr).await.map_err(|err| {
        tracing::error!(
            target: TRACING_TARGET_SERVER_STARTUP,
            addr = %server_addr,
            error = %err,
            "Failed to bind to address"
        );
        ServerError::bind_error(server_addr, err)
    })?;

    tracing::debug!(
        target: TRACING_TARGET_SERVER_STARTUP,
        addr = %server_addr,
        "Successfully bound to address"
    );

    let shutdown = shutdown_token();
    let graceful = shutdown.clone().cancelled_owned();

    serve_with_shutdown(&server_config, shutdown, || {
        axum::serve(listener, app)
            .with_graceful_shutdown(graceful)
            .into_future()
    })
    .await
}
