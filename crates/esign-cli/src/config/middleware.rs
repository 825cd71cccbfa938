//! Middleware configuration for the HTTP server.
//!
//! Groups CORS, OpenAPI and recovery settings. All of them are defined in
//! `esign-server` and accept both CLI arguments and environment variables.
//!
//! ```bash
//! esign --allowed-origins "https://sign.example.com" --request-timeout 60
//! ```

use clap::Args;
use esign_server::middleware::{CorsConfig, OpenApiConfig, RecoveryConfig};
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_CONFIG;

/// Middleware configuration combining CORS, OpenAPI and recovery settings.
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// CORS configuration.
    ///
    /// The first origin is also allowed to embed the signing view.
    #[clap(flatten)]
    pub cors: CorsConfig,

    /// Paths of the OpenAPI JSON specification and the Scalar UI.
    #[clap(flatten)]
    pub openapi: OpenApiConfig,

    /// Request timeout and panic recovery.
    #[clap(flatten)]
    pub recovery: RecoveryConfig,
}

impl MiddlewareConfig {
    /// Validates middleware settings.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.recovery.validate().map_err(anyhow::Error::msg)
    }

    /// Logs middleware configuration at info level.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            origins = ?self.cors.allowed_origins,
            credentials = self.cors.allow_credentials,
            "CORS configuration"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            openapi_path = %self.openapi.open_api_json,
            scalar_path = %self.openapi.scalar_ui,
            "OpenAPI configuration"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            request_timeout_secs = self.recovery.request_timeout,
            "Recovery configuration"
        );
    }
}
