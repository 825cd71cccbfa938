//! Response types for HTTP handlers.

mod documents;
mod errors;

pub use documents::*;
pub use errors::*;
