//! Database constraint violations organized by table.

mod documents;

use std::fmt;

pub use documents::DocumentConstraints;
use serde::{Deserialize, Serialize};

/// Unified constraint violation enum that can represent any known database constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ConstraintViolation {
    Documents(DocumentConstraints),
}

/// Categories of database constraint violations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintCategory {
    /// Data validation constraints (format, length, range checks).
    Validation,
    /// Chronological integrity constraints (timestamp relationships).
    Chronological,
    /// Business logic constraints (domain-specific rules).
    BusinessLogic,
    /// Uniqueness constraints (primary keys, unique indexes).
    Uniqueness,
}

impl ConstraintViolation {
    /// Creates a new [`ConstraintViolation`] from the constraint name.
    ///
    /// Returns `None` if the constraint name is not recognized.
    ///
    /// ```
    /// use esign_postgres::types::ConstraintViolation;
    ///
    /// assert!(ConstraintViolation::new("documents_signature_consistency").is_some());
    /// assert!(ConstraintViolation::new("unknown_constraint").is_none());
    /// ```
    pub fn new(constraint: &str) -> Option<Self> {
        if constraint.starts_with("documents_") {
            return DocumentConstraints::new(constraint).map(ConstraintViolation::Documents);
        }

        None
    }

    /// Returns the table name associated with this constraint.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConstraintViolation::Documents(_) => "documents",
        }
    }

    /// Returns the category of this constraint violation.
    pub fn constraint_category(&self) -> ConstraintCategory {
        match self {
            ConstraintViolation::Documents(c) => c.categorize(),
        }
    }
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintViolation::Documents(c) => write!(f, "{}", c),
        }
    }
}

impl From<ConstraintViolation> for String {
    #[inline]
    fn from(val: ConstraintViolation) -> Self {
        val.to_string()
    }
}

impl TryFrom<String> for ConstraintViolation {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value).ok_or_else(|| format!("Unknown constraint: {}", value))
    }
}
