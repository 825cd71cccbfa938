//! Document response types.

use esign_postgres::model;
use esign_postgres::types::{DocumentStatus, SignatureType};
use jiff::Timestamp;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Represents a document with its signing state.
#[must_use]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Identifier of the document (`DOC-{uuid}`).
    pub doc_id: String,
    /// Original file name as uploaded.
    pub name: String,
    /// Location of the stored PDF.
    ///
    /// Relative to the `/api` mount, except for the e-sign view where it is
    /// an absolute download URL.
    pub document_path: String,
    /// Typed signature text or the stored path of a drawn signature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// How the signature was captured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_type: Option<SignatureType>,
    /// Signing status.
    pub status: DocumentStatus,
    /// Timestamp when the document was uploaded.
    pub created_at: Timestamp,
    /// Timestamp of the last change.
    pub updated_at: Timestamp,
}

impl Document {
    /// Replaces the document path with an absolute download URL.
    pub fn with_document_url(mut self, url: String) -> Self {
        self.document_path = url;
        self
    }
}

impl From<model::Document> for Document {
    fn from(document: model::Document) -> Self {
        Self {
            doc_id: document.doc_id,
            name: document.name,
            document_path: document.document_path,
            signature: document.signature,
            signature_type: document.signature_type,
            status: document.status,
            created_at: document.created_at.into(),
            updated_at: document.updated_at.into(),
        }
    }
}

/// Response for listing all documents.
pub type Documents = Vec<Document>;

/// A status message together with the affected document.
#[must_use]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMessage {
    /// Human-readable outcome.
    pub message: String,
    /// The document after the operation.
    pub document: Document,
}

impl DocumentMessage {
    /// Creates a new message response.
    pub fn new(message: impl Into<String>, document: impl Into<Document>) -> Self {
        Self {
            message: message.into(),
            document: document.into(),
        }
    }
}

/// Response for a generated signature preview.
#[must_use]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    /// Human-readable outcome.
    pub message: String,
    /// Location of the preview, relative to the `/api` mount.
    pub preview_url: String,
}

#[cfg(test)]
mod tests {
    use esign_postgres::types::DocumentId;

    use super::*;

    fn pending_document() -> model::Document {
        model::Document {
            doc_id: DocumentId::new_v4().to_string(),
            name: "contract.pdf".to_owned(),
            document_path: "/uploads/contract.pdf".to_owned(),
            signature: None,
            signature_type: None,
            status: DocumentStatus::Pending,
            created_at: Timestamp::UNIX_EPOCH.into(),
            updated_at: Timestamp::UNIX_EPOCH.into(),
        }
    }

    #[test]
    fn pending_documents_omit_signature_fields() -> anyhow::Result<()> {
        let document = Document::from(pending_document());
        let value = serde_json::to_value(&document)?;

        assert_eq!(value["status"], "pending");
        assert_eq!(value["documentPath"], "/uploads/contract.pdf");
        assert_eq!(value["createdAt"], "1970-01-01T00:00:00Z");
        assert!(value.get("signature").is_none());
        assert!(value.get("signatureType").is_none());
        Ok(())
    }

    #[test]
    fn signed_documents_carry_the_signature() -> anyhow::Result<()> {
        let mut model = pending_document();
        model.signature = Some("Jane Doe".to_owned());
        model.signature_type = Some(SignatureType::Typed);
        model.status = DocumentStatus::Signed;

        let value = serde_json::to_value(DocumentMessage::new("done", model))?;

        assert_eq!(value["message"], "done");
        assert_eq!(value["document"]["signature"], "Jane Doe");
        assert_eq!(value["document"]["signatureType"], "typed");
        assert_eq!(value["document"]["status"], "signed");
        Ok(())
    }
}
