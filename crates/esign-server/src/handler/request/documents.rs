//! Document request types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Request payload for signing a document.
///
/// Both fields are optional at the wire level so that a missing signature
/// and an unusable one can be reported with different messages.
#[must_use]
#[derive(Debug, Default, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignDocumentRequest {
    /// Signature text for `typed`, or a `data:image/<fmt>;base64,...` URL
    /// for `drawn`.
    #[serde(default)]
    pub signature: Option<String>,
    /// Either `typed` or `drawn`.
    #[serde(default)]
    pub signature_type: Option<String>,
}

