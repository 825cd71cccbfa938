//! Contains constraints, enumerations and other custom types.

pub mod constants;
mod constraints;
mod document_id;
mod enums;

pub use constraints::{ConstraintCategory, ConstraintViolation, DocumentConstraints};
pub use document_id::{DocumentId, ParseDocumentIdError};
pub use enums::{DocumentStatus, SignatureType};
