//! Recovery middleware for handler panics and request timeouts.
//!
//! A request that exceeds the configured timeout receives `408 Request
//! Timeout`; a panicking handler receives `500 Internal Server Error`. The
//! server keeps running in both cases.

use std::any::Any;
use std::future::ready;
use std::time::Duration;

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::response::{IntoResponse, Response};
#[cfg(feature = "config")]
use clap::Args;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower::timeout::TimeoutLayer;
use tower_http::catch_panic::CatchPanicLayer;

use crate::handler::{Error, ErrorKind};

/// Tracing target for error recovery.
const TRACING_TARGET_ERROR: &str = "esign_server::middleware::recovery";

/// Tracing target for panic recovery.
const TRACING_TARGET_PANIC: &str = "esign_server::middleware::panic";

type ResponseFut = BoxFuture<'static, Response>;
type Panic = Box<dyn Any + Send + 'static>;

/// Configuration for recovery middleware behavior.
///
/// This struct controls how the recovery middleware handles various
/// error conditions including timeouts and panic recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct RecoveryConfig {
    /// Maximum duration in seconds to wait for a request to complete.
    /// Requests exceeding it receive a 408 response.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "REQUEST_TIMEOUT", default_value = "30")
    )]
    pub request_timeout: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            request_timeout: 30,
        }
    }
}

impl RecoveryConfig {
    /// Creates a new configuration with the specified request timeout in seconds.
    pub fn with_timeout_secs(secs: u64) -> Self {
        Self {
            request_timeout: secs,
        }
    }

    /// Returns the request timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.request_timeout == 0 {
            return Err("request timeout must be at least one second".to_owned());
        }
        Ok(())
    }
}

/// Extension trait for `axum::`[`Router`] to apply recovery middleware.
///
/// This trait provides convenient methods to add error recovery capabilities
/// to your Axum router, protecting against panics and enforcing timeouts.
pub trait RouterRecoveryExt<S> {
    /// Layers recovery middleware with the provided configuration.
    ///
    /// This middleware stack handles request timeouts, panics in handlers,
    /// and Tower service errors, converting them to appropriate HTTP responses.
    fn with_recovery(self, config: &RecoveryConfig) -> Self;

    /// Layers recovery middleware with default configuration.
    ///
    /// Uses a 30-second timeout suitable for most production environments.
    fn with_default_recovery(self) -> Self;
}

impl<S> RouterRecoveryExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_recovery(self, config: &RecoveryConfig) -> Self {
        let middlewares = ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_error))
            .layer(CatchPanicLayer::custom(catch_panic))
            .layer(TimeoutLayer::new(config.request_timeout()));

        self.layer(middlewares)
    }

    fn with_default_recovery(self) -> Self {
        self.with_recovery(&RecoveryConfig::default())
    }
}

fn handle_error(err: tower::BoxError) -> ResponseFut {
    use tower::timeout::error::Elapsed;

    let error = if err.is::<Elapsed>() {
        tracing::warn!(
            target: TRACING_TARGET_ERROR,
            error = %err,
            "Request timeout exceeded"
        );

        Error::new(ErrorKind::RequestTimeout)
            .with_message("Request timeout")
            .with_context("The request took too long to process and was terminated")
    } else {
        tracing::error!(
            target: TRACING_TARGET_ERROR,
            error = %err,
            "Unknown middleware error"
        );

        Error::new(ErrorKind::InternalServerError)
            .with_message("An unexpected error occurred")
            .with_context(err.to_string())
    };

    ready(error.into_response()).boxed()
}

fn catch_panic(err: Panic) -> Response {
    // If the panic is an Error, return it directly.
    if let Some(error) = err.downcast_ref::<Error>() {
        tracing::error!(
            target: TRACING_TARGET_PANIC,
            error = %error,
            "Handler panicked"
        );
        return error.clone().into_response();
    }

    let message = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic type");

    tracing::error!(
        target: TRACING_TARGET_PANIC,
        message = %message,
        "Handler panicked"
    );

    Error::new(ErrorKind::InternalServerError)
        .with_message("An unexpected panic occurred")
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::routing::get;
    use axum_test::TestServer;

    use super::*;

    #[tokio::test]
    async fn slow_requests_time_out() -> anyhow::Result<()> {
        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    "done"
                }),
            )
            .with_recovery(&RecoveryConfig::with_timeout_secs(1));
        let server = TestServer::new(app)?;

        let response = server.get("/slow").await;
        response.assert_status(axum::http::StatusCode::REQUEST_TIMEOUT);
        Ok(())
    }

    #[tokio::test]
    async fn panics_become_internal_errors() -> anyhow::Result<()> {
        async fn explode() -> &'static str {
            panic!("boom")
        }

        let app = Router::new()
            .route("/panic", get(explode))
            .with_default_recovery();
        let server = TestServer::new(app)?;

        let response = server.get("/panic").await;
        response.assert_status_internal_server_error();

        let body = response.json::<serde_json::Value>();
        assert_eq!(body["message"], "An unexpected panic occurred");

        // The server keeps serving after a panic.
        server.get("/panic").await.assert_status_internal_server_error();
        Ok(())
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(RecoveryConfig::with_timeout_secs(0).validate().is_err());
        assert!(RecoveryConfig::default().validate().is_ok());
    }
}
