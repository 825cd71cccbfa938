//! Documents table constraint violations.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::ConstraintCategory;

/// Document table constraint violations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumString, Display, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum DocumentConstraints {
    // Document validation constraints
    #[strum(serialize = "documents_doc_id_format")]
    DocIdFormat,
    #[strum(serialize = "documents_name_length")]
    NameLength,
    #[strum(serialize = "documents_document_path_format")]
    DocumentPathFormat,

    // Signing lifecycle constraints
    #[strum(serialize = "documents_signature_consistency")]
    SignatureConsistency,

    // Document chronological constraints
    #[strum(serialize = "documents_updated_after_created")]
    UpdatedAfterCreated,

    // Document uniqueness constraints
    #[strum(serialize = "documents_pkey")]
    PrimaryKey,
}

impl DocumentConstraints {
    /// Creates a new [`DocumentConstraints`] from the constraint name.
    pub fn new(constraint: &str) -> Option<Self> {
        constraint.parse().ok()
    }

    /// Returns the category of this constraint violation.
    pub fn categorize(&self) -> ConstraintCategory {
        match self {
            DocumentConstraints::DocIdFormat
            | DocumentConstraints::NameLength
            | DocumentConstraints::DocumentPathFormat => ConstraintCategory::Validation,

            DocumentConstraints::SignatureConsistency => ConstraintCategory::BusinessLogic,
            DocumentConstraints::UpdatedAfterCreated => ConstraintCategory::Chronological,
            DocumentConstraints::PrimaryKey => ConstraintCategory::Uniqueness,
        }
    }
}

impl From<DocumentConstraints> for String {
    #[inline]
    fn from(val: DocumentConstraints) -> Self {
        val.to_string()
    }
}

impl TryFrom<String> for DocumentConstraints {
    type Error = strum::ParseError;

    #[inline]
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
