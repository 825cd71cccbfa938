#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod server;

use std::process;

use anyhow::Context;
use axum::Router;
use esign_server::handler::{routes, with_static_routes};
use esign_server::middleware::{
    RouterObservabilityExt, RouterOpenApiExt, RouterRecoveryExt, RouterSecurityExt,
};
use esign_server::service::ServiceState;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{Cli, MiddlewareConfig};

// Tracing target constants
pub const TRACING_TARGET_SERVER_STARTUP: &str = "esign_cli::server::startup";
pub const TRACING_TARGET_SERVER_SHUTDOWN: &str = "esign_cli::server::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "esign_cli::config";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            "application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            error = format!("{error:#}"),
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    init_tracing();
    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        version = env!("CARGO_PKG_VERSION"),
        "starting esign server"
    );

    cli.log();
    cli.validate()?;

    let state = ServiceState::from_config(&cli.service)
        .await
        .context("failed to create service state")?;
    let router = create_router(state, &cli.middleware);

    server::serve(router, cli.server).await?;

    Ok(())
}

/// Creates the router with all middleware layers applied.
///
/// Middleware is applied in reverse order (last added = outermost):
/// 1. Recovery (outermost) - catches panics and enforces timeouts
/// 2. Observability - request IDs and tracing spans
/// 3. Security - CORS, framing headers, compression, body limit
/// 4. Routes (innermost) - API handlers, uploaded files, fallback
fn create_router(state: ServiceState, middleware: &MiddlewareConfig) -> Router {
    // Without explicit origins, the public base URL is the trusted frontend.
    let base_origin = state
        .links
        .base_url()
        .map(|url| url.origin().ascii_serialization());
    let cors = middleware.cors.clone().or_origin(base_origin);

    let api_routes = routes().with_open_api(middleware.openapi.clone());

    with_static_routes(api_routes, &state)
        .with_security(&cors)
        .with_observability()
        .with_recovery(&middleware.recovery)
        .with_state(state)
}

/// Initializes tracing with `RUST_LOG` filtering, defaulting to `info`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use axum_test::TestServer;
    use clap::Parser;
    use esign_server::middleware::REQUEST_ID_HEADER;
    use esign_server::service::ServiceConfig;

    use super::*;

    #[tokio::test]
    async fn router_applies_the_middleware_stack() -> anyhow::Result<()> {
        let uploads = tempfile::tempdir()?;
        let service = ServiceConfig::builder()
            .with_uploads_dir(uploads.path())
            .with_postgres_run_migrations(false)
            .with_base_url("https://sign.example.com/app")
            .build()?;
        let state = ServiceState::from_config(&service).await?;

        let cli = Cli::try_parse_from([
            "esign",
            "--postgres-url",
            "postgresql://localhost/esign",
        ])?;
        let server = TestServer::new(create_router(state, &cli.middleware))?;

        let response = server.get("/api/documents/not-a-document/preview").await;
        response.assert_status_not_found();
        assert!(!response.header(REQUEST_ID_HEADER).is_empty());
        response.assert_header("x-frame-options", "ALLOW-FROM https://sign.example.com");

        let response = server.get("/api/openapi.json").await;
        response.assert_status_ok();
        let openapi = response.json::<serde_json::Value>();
        assert!(openapi["paths"]["/api/documents/{docId}/sign"].is_object());
        Ok(())
    }
}
