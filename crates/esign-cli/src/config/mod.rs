//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── server: ServerConfig         # Host, port, shutdown
//! ├── middleware: MiddlewareConfig # CORS, OpenAPI, recovery/timeouts
//! └── service: ServiceConfig       # Postgres, uploads, converter, base URL
//! ```
//!
//! All configuration can be provided via CLI arguments or environment
//! variables. Use `--help` to see all available options.
//!
//! ```bash
//! esign --postgres-url "postgresql://..." --port 8080
//!
//! POSTGRES_URL="postgresql://..." PORT=8080 esign
//! ```

mod middleware;
mod server;

use std::process;

use anyhow::Context;
use clap::Parser;
use esign_server::service::ServiceConfig;
pub use middleware::MiddlewareConfig;
use serde::{Deserialize, Serialize};
pub use server::ServerConfig;

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_SERVER_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "esign")]
#[command(about = "Document upload, e-signature and preview server")]
#[command(version)]
pub struct Cli {
    /// Server network and lifecycle configuration.
    #[clap(flatten)]
    pub server: ServerConfig,

    /// HTTP middleware configuration (CORS, OpenAPI, timeouts).
    #[clap(flatten)]
    pub middleware: MiddlewareConfig,

    /// Database, storage and conversion configuration.
    #[clap(flatten)]
    pub service: ServiceConfig,
}

impl Cli {
    /// Loads the `.env` file (if enabled) and parses CLI arguments.
    ///
    /// The `.env` file is read first so its values act as environment
    /// defaults for clap.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.server
            .validate()
            .context("invalid server configuration")?;
        self.middleware
            .validate()
            .context("invalid middleware configuration")?;
        self.service
            .validate()
            .context("invalid service configuration")?;

        // Uploads convert inside the request, so the converter gives up first.
        let request_timeout = self.middleware.recovery.request_timeout;
        if self.service.converter_timeout_secs >= request_timeout {
            anyhow::bail!(
                "converter timeout ({}s) must be shorter than the request timeout ({request_timeout}s)",
                self.service.converter_timeout_secs
            );
        }

        Ok(())
    }

    /// Logs configuration (no secrets).
    pub fn log(&self) {
        Self::log_build_info();
        self.server.log();
        self.middleware.log();

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            postgres_url = %self.service.postgres.database_url_masked(),
            postgres_max_connections = self.service.postgres.postgres_max_connections,
            run_migrations = self.service.postgres_run_migrations,
            "Database configuration"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            uploads_dir = %self.service.uploads_dir.display(),
            converter = %self.service.converter_bin,
            converter_timeout_secs = self.service.converter_timeout_secs,
            base_url = ?self.service.base_url,
            "Document configuration"
        );
    }

    fn log_build_info() {
        tracing::debug!(
            target: TRACING_TARGET_SERVER_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            dotenv = cfg!(feature = "dotenv"),
            "Build information"
        );
    }
}
