//! HTTP server startup, graceful shutdown and error reporting.

mod error;
mod http_server;
mod lifecycle;
mod shutdown;

pub use error::{Result, ServerError};
pub use http_server::serve_http as serve;
