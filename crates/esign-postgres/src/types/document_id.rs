//! Document identifier of the form `DOC-{uuid}`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::constants::document::DOC_ID_PREFIX;

/// Error returned when a string is not a valid [`DocumentId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid document identifier: expected `{DOC_ID_PREFIX}` followed by a UUID")]
pub struct ParseDocumentIdError;

/// Unique, immutable identifier of a document.
///
/// Rendered as `DOC-` followed by a lowercase hyphenated UUID. Parsing
/// normalizes any UUID form accepted by [`Uuid::parse_str`] to that shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Generates a new random identifier.
    #[inline]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{DOC_ID_PREFIX}{}", self.0.hyphenated())
    }
}

impl FromStr for DocumentId {
    type Err = ParseDocumentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = s
            .strip_prefix(DOC_ID_PREFIX)
            .ok_or(ParseDocumentIdError)?;

        Uuid::parse_str(uuid)
            .map(Self)
            .map_err(|_| ParseDocumentIdError)
    }
}

impl From<DocumentId> for String {
    #[inline]
    fn from(value: DocumentId) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for DocumentId {
    type Error = ParseDocumentIdError;

    #[inline]
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
