//! OpenAPI specification with a Scalar UI.
//!
//! The specification is generated by [`aide`] from the documented routes of
//! an [`ApiRouter`] and served as JSON next to an interactive reference.
//!
//! ```rust
//! use aide::axum::ApiRouter;
//! use axum::Router;
//! use esign_server::middleware::{OpenApiConfig, RouterOpenApiExt};
//!
//! let app: Router<()> = ApiRouter::new()
//!     .with_open_api(OpenApiConfig::default());
//! ```
//!
//! [`aide`]: https://docs.rs/aide
//! [`ApiRouter`]: aide::axum::ApiRouter

use aide::axum::ApiRouter;
use aide::openapi::{Info, License, OpenApi};
use aide::scalar::Scalar;
use axum::routing::{Router, get};
use axum::{Extension, Json};
#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

/// OpenAPI configuration for aide integration.
///
/// Configures the paths where the OpenAPI JSON specification and
/// Scalar UI will be served.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct OpenApiConfig {
    /// Path which exposes the OpenAPI JSON specification.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "OPENAPI_JSON_PATH", default_value = "/api/openapi.json")
    )]
    pub open_api_json: String,

    /// Path which exposes the Scalar API reference UI.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "OPENAPI_SCALAR_PATH", default_value = "/api/scalar")
    )]
    pub scalar_ui: String,
}

impl Default for OpenApiConfig {
    fn default() -> Self {
        Self {
            open_api_json: "/api/openapi.json".to_owned(),
            scalar_ui: "/api/scalar".to_owned(),
        }
    }
}

/// Extension trait for [`ApiRouter`] to serve its OpenAPI specification.
///
/// [`ApiRouter`]: aide::axum::ApiRouter
pub trait RouterOpenApiExt<S> {
    /// Finishes the router with the default API info.
    fn with_open_api(self, config: OpenApiConfig) -> Router<S>;

    /// Finishes the router with custom API info.
    fn with_open_api_info(self, config: OpenApiConfig, info: Info) -> Router<S>;
}

impl<S> RouterOpenApiExt<S> for ApiRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_open_api(self, config: OpenApiConfig) -> Router<S> {
        let info = Info {
            title: "esign API".to_owned(),
            summary: Some("Document upload, e-signature and signed preview service".to_owned()),
            description: Some(
                "Upload PDF or DOCX documents, sign them with a typed or drawn signature and \
                 render a PDF preview with the signature placed on the last page."
                    .to_owned(),
            ),
            license: Some(License {
                name: "MIT".to_owned(),
                identifier: Some("MIT".to_owned()),
                ..License::default()
            }),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            ..Info::default()
        };

        self.with_open_api_info(config, info)
    }

    fn with_open_api_info(self, config: OpenApiConfig, info: Info) -> Router<S> {
        async fn serve_openapi(Extension(api): Extension<OpenApi>) -> Json<OpenApi> {
            Json(api)
        }

        let mut api = OpenApi {
            info,
            ..OpenApi::default()
        };

        // Add Scalar UI route and OpenAPI JSON route
        let scalar = Scalar::new(&config.open_api_json);
        let router = self
            .route(&config.scalar_ui, scalar.axum_route())
            .route(&config.open_api_json, get(serve_openapi));

        // Generate the OpenAPI specification and add it as an extension
        router.finish_api(&mut api).layer(Extension(api))
    }
}
