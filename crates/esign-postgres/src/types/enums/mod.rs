//! Enumerations mapped to PostgreSQL enum types.

mod document_status;
mod signature_type;

pub use document_status::DocumentStatus;
pub use signature_type::SignatureType;
