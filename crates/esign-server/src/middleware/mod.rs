//! Middleware for `axum::Router` and HTTP request processing.
//!
//! - Recovery (request timeouts, handler panics)
//! - Observability (request IDs, tracing spans)
//! - Security (CORS, framing headers, compression, body limit)
//! - OpenAPI documentation
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use axum::Router;
//! use esign_server::middleware::{
//!     RouterObservabilityExt, RouterRecoveryExt, RouterSecurityExt,
//! };
//!
//! let app: Router<()> = Router::new()
//!     .with_default_security()
//!     .with_observability()
//!     .with_default_recovery();
//! ```

mod observability;
mod recovery;
mod security;
mod specification;

pub use observability::{REQUEST_ID_HEADER, RouterObservabilityExt};
pub use recovery::{RecoveryConfig, RouterRecoveryExt};
pub use security::{CorsConfig, DEFAULT_MAX_BODY_SIZE, RouterSecurityExt};
pub use specification::{OpenApiConfig, RouterOpenApiExt};
