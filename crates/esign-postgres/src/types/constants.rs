//! Constants shared between the store and its callers.

/// Document-related constants.
pub mod document {
    /// Prefix of every document identifier.
    pub const DOC_ID_PREFIX: &str = "DOC-";

    /// Maximum length of a document name, in characters.
    pub const MAX_NAME_LENGTH: usize = 255;

    /// Prefix of every stored document path, relative to the uploads mount.
    pub const DOCUMENT_PATH_PREFIX: &str = "/uploads/";
}
