//! Request extractors with consistent error handling.
//!
//! # Request Data Extraction
//!
//! - [`Json`] - JSON bodies with JSON error responses
//! - [`Path`] - Path parameters with detailed error context
//! - [`Multipart`] - `multipart/form-data` uploads
//!
//! # Request Metadata
//!
//! - [`RequestHost`] - The `Host` header, used to build absolute links

// Request Data Extraction
pub mod reject;

// Request Metadata
mod request_host;

pub use crate::extract::reject::{Json, Multipart, Path};
pub use crate::extract::request_host::RequestHost;
