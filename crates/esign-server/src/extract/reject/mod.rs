//! Request extractors that reject with the server's JSON error format.
//!
//! Each extractor wraps its Axum counterpart and converts the rejection into
//! a [`handler::Error`](crate::handler::Error).

mod enhanced_json;
mod enhanced_multipart;
mod enhanced_path;

pub use self::enhanced_json::Json;
pub use self::enhanced_multipart::Multipart;
pub use self::enhanced_path::Path;
