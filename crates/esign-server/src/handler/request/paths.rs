//! Path parameter types for HTTP handlers.

use esign_postgres::types::DocumentId;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::handler::{ErrorKind, Result};

/// Path parameters for document operations.
#[must_use]
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPathParams {
    /// Document identifier of the form `DOC-{uuid}`.
    pub doc_id: String,
}

impl DocumentPathParams {
    /// Parses the document identifier.
    ///
    /// An identifier that is not of the form `DOC-{uuid}` cannot belong to
    /// any document, so it is reported as not found.
    pub fn document_id(&self) -> Result<DocumentId> {
        self.doc_id.parse().map_err(|_| {
            ErrorKind::NotFound
                .with_message("Document not found")
                .with_resource("document")
                .with_context(format!("malformed document id: {}", self.doc_id))
                .into_static()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_ids_are_not_found() {
        let params = DocumentPathParams {
            doc_id: "not-a-document".to_owned(),
        };

        let error = params.document_id().expect_err("id is malformed");
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert_eq!(error.message(), Some("Document not found"));
    }

    #[test]
    fn well_formed_ids_parse() -> anyhow::Result<()> {
        let params = DocumentPathParams {
            doc_id: "DOC-67e55044-10b1-426f-9247-bb680e5fe0c8".to_owned(),
        };

        assert_eq!(params.document_id()?.to_string(), params.doc_id);
        Ok(())
    }
}
