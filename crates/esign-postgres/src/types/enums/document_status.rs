//! Document status enumeration for the signing lifecycle.

use diesel_derive_enum::DbEnum;
#[cfg(feature = "schema")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Signing status of a document.
///
/// This enumeration corresponds to the `DOCUMENT_STATUS` PostgreSQL enum.
/// The only transition is `Pending` to `Signed`; a signed document never
/// returns to pending.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[derive(Serialize, Deserialize, DbEnum, Display, EnumIter, EnumString)]
#[ExistingTypePath = "crate::schema::sql_types::DocumentStatus"]
pub enum DocumentStatus {
    /// Uploaded and awaiting a signature
    #[db_rename = "pending"]
    #[serde(rename = "pending")]
    #[strum(serialize = "pending")]
    #[default]
    Pending,

    /// A signature has been attached
    #[db_rename = "signed"]
    #[serde(rename = "signed")]
    #[strum(serialize = "signed")]
    Signed,
}

impl DocumentStatus {
    /// Returns whether the document has been signed.
    #[inline]
    pub fn is_signed(self) -> bool {
        matches!(self, DocumentStatus::Signed)
    }
}
