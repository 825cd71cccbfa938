//! Signature capture method.

use diesel_derive_enum::DbEnum;
#[cfg(feature = "schema")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// How a signature was captured.
///
/// This enumeration corresponds to the `SIGNATURE_TYPE` PostgreSQL enum.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[derive(Serialize, Deserialize, DbEnum, Display, EnumIter, EnumString)]
#[ExistingTypePath = "crate::schema::sql_types::SignatureType"]
pub enum SignatureType {
    /// Plain text rendered with a standard font
    #[db_rename = "typed"]
    #[serde(rename = "typed")]
    #[strum(serialize = "typed")]
    Typed,

    /// Raster image drawn on a canvas
    #[db_rename = "drawn"]
    #[serde(rename = "drawn")]
    #[strum(serialize = "drawn")]
    Drawn,
}
