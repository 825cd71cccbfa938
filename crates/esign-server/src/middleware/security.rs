//! Security middleware for HTTP request protection.
//!
//! Applies CORS rules, framing headers that allow the signing view to be
//! embedded by the configured frontend, a request body limit and response
//! compression.

use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::http::header::{self, HeaderValue};
#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

/// Tracing target for security middleware.
const TRACING_TARGET: &str = "esign_server::middleware::security";

/// Maximum request body size: 4 MiB.
///
/// Uploads are capped at 1 MiB by the upload handler itself; this limit only
/// bounds what the server is willing to read at all.
pub const DEFAULT_MAX_BODY_SIZE: usize = 4 * 1024 * 1024;

/// Origins allowed when none are configured.
const DEVELOPMENT_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:5173",
    "http://127.0.0.1:5173",
];

/// Extension trait for `axum::`[`Router`] to apply security middleware.
pub trait RouterSecurityExt<S> {
    /// Layers CORS, framing headers, compression and the body limit.
    fn with_security(self, cors: &CorsConfig) -> Self;

    /// Layers security middleware with development-friendly CORS settings.
    fn with_default_security(self) -> Self;
}

impl<S> RouterSecurityExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_security(self, cors: &CorsConfig) -> Self {
        let cors_layer = CorsLayer::new()
            .allow_origin(cors.to_header_values())
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
            .allow_credentials(cors.allow_credentials)
            .max_age(cors.max_age());

        let framing = FramingHeaders::new(cors.frame_origin());

        self.layer(DefaultBodyLimit::max(DEFAULT_MAX_BODY_SIZE))
            .layer(CompressionLayer::new())
            .layer(cors_layer)
            .layer(SetResponseHeaderLayer::overriding(
                header::X_FRAME_OPTIONS,
                framing.frame_options,
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::CONTENT_SECURITY_POLICY,
                framing.content_security_policy,
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
    }

    fn with_default_security(self) -> Self {
        self.with_security(&CorsConfig::default())
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
///
/// The first allowed origin is also the one permitted to embed the server's
/// pages in a frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct CorsConfig {
    /// List of allowed CORS origins.
    ///
    /// If empty, defaults to localhost origins for development.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "CORS_ORIGINS", value_delimiter = ',')
    )]
    pub allowed_origins: Vec<String>,

    /// Maximum age for CORS preflight requests in seconds.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "CORS_MAX_AGE", default_value = "3600")
    )]
    pub max_age_seconds: u64,

    /// Whether to allow credentials in CORS requests.
    #[cfg_attr(
        feature = "config",
        arg(
            long,
            env = "CORS_ALLOW_CREDENTIALS",
            default_value_t = true,
            action = clap::ArgAction::Set
        )
    )]
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            max_age_seconds: 3600,
            allow_credentials: true,
        }
    }
}

impl CorsConfig {
    /// Returns the CORS max age as a Duration.
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_seconds)
    }

    /// Uses `origin` when no origins are configured.
    pub fn or_origin(mut self, origin: Option<String>) -> Self {
        if self.allowed_origins.is_empty() {
            self.allowed_origins.extend(origin);
        }
        self
    }

    /// Returns the origin allowed to frame the server's pages.
    pub fn frame_origin(&self) -> Option<&str> {
        self.allowed_origins
            .iter()
            .map(|origin| origin.trim_end_matches('/'))
            .find(|origin| !origin.is_empty())
    }

    /// Converts configured origins to header values, falling back to
    /// localhost for development. Unparsable origins are skipped.
    pub fn to_header_values(&self) -> Vec<HeaderValue> {
        if self.allowed_origins.is_empty() {
            return DEVELOPMENT_ORIGINS
                .into_iter()
                .map(HeaderValue::from_static)
                .collect();
        }

        self.allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin.trim_end_matches('/')) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(target: TRACING_TARGET, origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect()
    }
}

/// `X-Frame-Options` and `Content-Security-Policy` values.
#[derive(Debug, Clone)]
struct FramingHeaders {
    frame_options: HeaderValue,
    content_security_policy: HeaderValue,
}

impl FramingHeaders {
    fn new(origin: Option<&str>) -> Self {
        let embedded = origin.and_then(|origin| {
            let frame_options = HeaderValue::from_str(&format!("ALLOW-FROM {origin}")).ok()?;
            let csp = HeaderValue::from_str(&format!("frame-ancestors 'self' {origin}")).ok()?;
            Some(Self {
                frame_options,
                content_security_policy: csp,
            })
        });

        embedded.unwrap_or_else(|| Self {
            frame_options: HeaderValue::from_static("SAMEORIGIN"),
            content_security_policy: HeaderValue::from_static("frame-ancestors 'self'"),
        })
    }
}
