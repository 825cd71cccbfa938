//! Document model for PostgreSQL database operations.

use diesel::prelude::*;
use jiff_diesel::Timestamp;

use crate::schema::documents;
use crate::types::constants::document::DOCUMENT_PATH_PREFIX;
use crate::types::{DocumentId, DocumentStatus, SignatureType};

/// An uploaded document and its signing state.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = documents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Document {
    /// Unique document identifier (`DOC-{uuid}`).
    pub doc_id: String,
    /// Original filename as uploaded.
    pub name: String,
    /// Location of the canonical PDF, relative to the uploads mount.
    pub document_path: String,
    /// Typed signature text or the stored path of a drawn signature image.
    pub signature: Option<String>,
    /// How the signature was captured.
    pub signature_type: Option<SignatureType>,
    /// Signing status.
    pub status: DocumentStatus,
    /// Timestamp when the document was uploaded.
    pub created_at: Timestamp,
    /// Timestamp of the last change, refreshed on signing.
    pub updated_at: Timestamp,
}

/// Data for creating a new document.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = documents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewDocument {
    /// Document identifier.
    pub doc_id: String,
    /// Original filename.
    pub name: String,
    /// Stored PDF location.
    pub document_path: String,
}

/// Changes applied when a pending document is signed.
///
/// `updated_at` is not part of the changeset: it is stamped with the
/// database clock, the same clock that set `created_at`.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = documents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SignDocument {
    /// Signature text or image path.
    pub signature: String,
    /// Signature capture method.
    pub signature_type: SignatureType,
    /// Always [`DocumentStatus::Signed`].
    pub status: DocumentStatus,
}

impl Document {
    /// Returns the stored file name of the canonical PDF.
    pub fn file_name(&self) -> Option<&str> {
        self.document_path
            .strip_prefix(DOCUMENT_PATH_PREFIX)
            .filter(|name| !name.is_empty() && !name.contains('/'))
    }

    /// Returns whether the canonical file is a PDF.
    pub fn is_pdf(&self) -> bool {
        self.document_path.to_ascii_lowercase().ends_with(".pdf")
    }

    /// Returns whether the document has been signed.
    #[inline]
    pub fn is_signed(&self) -> bool {
        self.status.is_signed()
    }
}

impl NewDocument {
    /// Creates the insert payload for a stored file.
    ///
    /// `file_name` is the name of the canonical PDF inside the uploads directory.
    pub fn new(doc_id: DocumentId, name: impl Into<String>, file_name: &str) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            name: name.into(),
            document_path: format!("{DOCUMENT_PATH_PREFIX}{file_name}"),
        }
    }
}

impl SignDocument {
    /// Creates the changeset that moves a document to [`DocumentStatus::Signed`].
    pub fn new(signature: impl Into<String>, signature_type: SignatureType) -> Self {
        Self {
            signature: signature.into(),
            signature_type,
            status: DocumentStatus::Signed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(document_path: &str) -> Document {
        let now = jiff::Timestamp::now();
        Document {
            doc_id: DocumentId::new_v4().to_string(),
            name: "contract.pdf".to_owned(),
            document_path: document_path.to_owned(),
            signature: None,
            signature_type: None,
            status: DocumentStatus::Pending,
            created_at: Timestamp::from(now),
            updated_at: Timestamp::from(now),
        }
    }

    #[test]
    fn new_document_path_is_relative_to_uploads() {
        let new = NewDocument::new(DocumentId::new_v4(), "contract.docx", "abc.pdf");
        assert_eq!(new.document_path, "/uploads/abc.pdf");
        assert_eq!(new.name, "contract.docx");
        assert!(new.doc_id.starts_with("DOC-"));
    }

    #[test]
    fn file_name_rejects_nested_paths() {
        assert_eq!(document("/uploads/abc.pdf").file_name(), Some("abc.pdf"));
        assert_eq!(document("/uploads/output/abc.pdf").file_name(), None);
        assert_eq!(document("/elsewhere/abc.pdf").file_name(), None);
        assert_eq!(document("/uploads/").file_name(), None);
    }

    #[test]
    fn pdf_detection_is_case_insensitive() {
        assert!(document("/uploads/abc.PDF").is_pdf());
        assert!(!document("/uploads/abc.docx").is_pdf());
    }

    #[test]
    fn sign_changeset_marks_signed() {
        let changes = SignDocument::new("Jane Doe", SignatureType::Typed);
        assert_eq!(changes.status, DocumentStatus::Signed);
        assert_eq!(changes.signature_type, SignatureType::Typed);
    }
}
