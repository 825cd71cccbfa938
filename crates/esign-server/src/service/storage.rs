//! On-disk layout of the uploads directory.
//!
//! ```text
//! {uploads}/{uuid}.pdf                        uploaded or converted PDFs
//! {uploads}/{uuid}.docx                       original DOCX uploads
//! {uploads}/{docId}_signature.png             drawn signatures
//! {uploads}/output/{docId}_signed_preview.pdf generated previews
//! ```

use std::path::{Path, PathBuf};

use esign_postgres::model::Document;
use esign_postgres::types::DocumentId;
use esign_postgres::types::constants::document::{DOCUMENT_PATH_PREFIX, MAX_NAME_LENGTH};
use uuid::Uuid;

use crate::service::{Error, Result};

/// Tracing target for upload storage operations.
const TRACING_TARGET: &str = "esign_server::service::storage";

/// Maximum accepted upload size in bytes (1 MiB).
pub const MAX_FILE_SIZE: usize = 1_048_576;

/// Name of the preview directory inside the uploads directory.
pub const OUTPUT_DIR: &str = "output";

/// Document formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// MIME type of PDF files.
    pub const PDF_MIME: &'static str = "application/pdf";
    /// MIME type of Office Open XML word processing files.
    pub const DOCX_MIME: &'static str =
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

    /// Returns the format for a declared MIME type.
    ///
    /// Parameters such as `; charset=binary` are ignored.
    pub fn from_mime(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next()?.trim();

        if essence.eq_ignore_ascii_case(Self::PDF_MIME) {
            Some(Self::Pdf)
        } else if essence.eq_ignore_ascii_case(Self::DOCX_MIME) {
            Some(Self::Docx)
        } else {
            None
        }
    }

    /// Returns the format for a file name extension, case-insensitively.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let (_, extension) = file_name.rsplit_once('.')?;

        if extension.eq_ignore_ascii_case("pdf") {
            Some(Self::Pdf)
        } else if extension.eq_ignore_ascii_case("docx") {
            Some(Self::Docx)
        } else {
            None
        }
    }

    /// Detects the format of an upload.
    ///
    /// The declared MIME type must be one of the accepted types and the file
    /// name extension must agree with it.
    pub fn detect(file_name: &str, content_type: Option<&str>) -> Option<Self> {
        let declared = Self::from_mime(content_type?)?;
        let by_name = Self::from_file_name(file_name)?;
        (declared == by_name).then_some(declared)
    }

    /// Returns the lowercase file extension.
    #[inline]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
        }
    }
}

/// Returns whether a client-supplied file name is acceptable.
///
/// The name must be non-empty, at most 255 characters, and must not contain
/// path separators or `..`.
pub fn is_valid_file_name(file_name: &str) -> bool {
    let length = file_name.chars().count();

    (1..=MAX_NAME_LENGTH).contains(&length)
        && !file_name.contains(['/', '\\'])
        && !file_name.contains("..")
}

/// A file written to the uploads directory by [`UploadStorage::store_upload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    stem: Uuid,
    format: DocumentFormat,
    path: PathBuf,
}

impl StoredUpload {
    /// Returns the stored format.
    #[inline]
    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    /// Returns the location of the stored file.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the file name of the canonical PDF for this upload.
    ///
    /// For a DOCX upload this is the name the converter produces.
    pub fn pdf_file_name(&self) -> String {
        format!("{}.{}", self.stem, DocumentFormat::Pdf.extension())
    }
}

/// A drawn signature written next to its final location.
///
/// The image only becomes visible under its final name once
/// [`commit`](Self::commit) renames it.
#[derive(Debug)]
#[must_use = "staged signatures must be committed or discarded"]
pub struct StagedSignature {
    staged: PathBuf,
    target: PathBuf,
}

impl StagedSignature {
    /// Moves the staged image to its final location.
    pub async fn commit(self) -> Result<PathBuf> {
        tokio::fs::rename(&self.staged, &self.target)
            .await
            .map_err(|e| Error::file_system("Failed to store signature image").with_source(e))?;

        Ok(self.target)
    }

    /// Removes the staged image.
    pub async fn discard(self) {
        if let Err(error) = tokio::fs::remove_file(&self.staged).await {
            tracing::warn!(
                target: TRACING_TARGET,
                path = %self.staged.display(),
                error = %error,
                "Failed to remove staged signature"
            );
        }
    }
}

/// Files of the uploads directory.
#[derive(Debug, Clone)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    /// Creates a storage rooted at `root`. Nothing is touched on disk.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Returns the uploads directory.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the preview output directory.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    /// Creates the uploads and output directories if they are missing.
    pub async fn ensure_dirs(&self) -> Result<()> {
        tokio::fs::create_dir_all(self.output_dir())
            .await
            .map_err(|e| {
                Error::file_system(format!(
                    "Failed to create uploads directory {}",
                    self.root.display()
                ))
                .with_source(e)
            })?;

        Ok(())
    }

    /// Writes an upload as `{uuid}.{ext}`.
    pub async fn store_upload(&self, format: DocumentFormat, bytes: &[u8]) -> Result<StoredUpload> {
        let stem = Uuid::new_v4();
        let path = self.root.join(format!("{stem}.{}", format.extension()));

        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| Error::file_system("Failed to store uploaded file").with_source(e))?;

        tracing::debug!(
            target: TRACING_TARGET,
            path = %path.display(),
            size = bytes.len(),
            "Upload stored"
        );

        Ok(StoredUpload { stem, format, path })
    }

    /// Resolves a stored path of the form `/uploads/{file}` to a file inside
    /// the uploads directory.
    ///
    /// Paths pointing elsewhere or into subdirectories resolve to `None`.
    pub fn resolve(&self, stored_path: &str) -> Option<PathBuf> {
        stored_path
            .strip_prefix(DOCUMENT_PATH_PREFIX)
            .filter(|name| is_valid_file_name(name))
            .map(|name| self.root.join(name))
    }

    /// Returns the canonical PDF of a document.
    pub fn document_file(&self, document: &Document) -> Option<PathBuf> {
        document.file_name().map(|name| self.root.join(name))
    }

    /// Returns the file name of a document's drawn signature.
    pub fn signature_file_name(doc_id: DocumentId) -> String {
        format!("{doc_id}_signature.png")
    }

    /// Returns the value stored in the document record for a drawn signature.
    pub fn signature_stored_path(doc_id: DocumentId) -> String {
        format!("{DOCUMENT_PATH_PREFIX}{}", Self::signature_file_name(doc_id))
    }

    /// Writes a drawn signature to a staging file.
    pub async fn stage_signature(&self, doc_id: DocumentId, png: &[u8]) -> Result<StagedSignature> {
        let file_name = Self::signature_file_name(doc_id);
        let staged = self
            .root
            .join(format!(".{file_name}.{}.part", Uuid::new_v4().simple()));
        let target = self.root.join(file_name);

        tokio::fs::write(&staged, png)
            .await
            .map_err(|e| Error::file_system("Failed to write signature image").with_source(e))?;

        Ok(StagedSignature { staged, target })
    }

    /// Returns the preview output file of a document.
    pub fn preview_path(&self, doc_id: DocumentId) -> PathBuf {
        self.output_dir().join(Self::preview_file_name(doc_id))
    }

    /// Returns the preview URL, relative to the `/api` mount.
    pub fn preview_url(doc_id: DocumentId) -> String {
        format!(
            "{DOCUMENT_PATH_PREFIX}{OUTPUT_DIR}/{}",
            Self::preview_file_name(doc_id)
        )
    }

    fn preview_file_name(doc_id: DocumentId) -> String {
        format!("{doc_id}_signed_preview.pdf")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_detection_requires_agreement() {
        use DocumentFormat::{Docx, Pdf};

        assert_eq!(DocumentFormat::detect("a.pdf", Some("application/pdf")), Some(Pdf));
        assert_eq!(DocumentFormat::detect("A.PDF", Some("application/pdf")), Some(Pdf));
        assert_eq!(
            DocumentFormat::detect("contract.docx", Some(DocumentFormat::DOCX_MIME)),
            Some(Docx)
        );
        assert_eq!(DocumentFormat::detect("a.docx", Some("application/pdf")), None);
        assert_eq!(DocumentFormat::detect("a.pdf", Some("text/plain")), None);
        assert_eq!(DocumentFormat::detect("a.pdf", None), None);
        assert_eq!(DocumentFormat::detect("pdf", Some("application/pdf")), None);
    }

    #[test]
    fn mime_parameters_are_ignored() {
        assert_eq!(
            DocumentFormat::from_mime("application/pdf; charset=binary"),
            Some(DocumentFormat::Pdf)
        );
    }

    #[test]
    fn file_name_rules() {
        assert!(is_valid_file_name("contract.pdf"));
        assert!(!is_valid_file_name(""));
        assert!(!is_valid_file_name("../etc/passwd.pdf"));
        assert!(!is_valid_file_name("dir/contract.pdf"));
        assert!(!is_valid_file_name("dir\\contract.pdf"));
        assert!(!is_valid_file_name(&format!("{}.pdf", "a".repeat(252))));
    }

    #[test]
    fn docx_upload_maps_to_pdf_name() {
        let upload = StoredUpload {
            stem: Uuid::nil(),
            format: DocumentFormat::Docx,
            path: PathBuf::from("uploads/00000000-0000-0000-0000-000000000000.docx"),
        };

        assert_eq!(
            upload.pdf_file_name(),
            "00000000-0000-0000-0000-000000000000.pdf"
        );
    }

    #[test]
    fn stored_paths_resolve_inside_root() {
        let storage = UploadStorage::new("/srv/uploads");

        assert_eq!(
            storage.resolve("/uploads/abc.pdf"),
            Some(PathBuf::from("/srv/uploads/abc.pdf"))
        );
        assert_eq!(storage.resolve("/uploads/../secret"), None);
        assert_eq!(storage.resolve("/uploads/output/x.pdf"), None);
        assert_eq!(storage.resolve("/tmp/abc.pdf"), None);
    }

    #[test]
    fn preview_locations() -> anyhow::Result<()> {
        let doc_id: DocumentId = "DOC-67e55044-10b1-426f-9247-bb680e5fe0c8".parse()?;
        let storage = UploadStorage::new("/srv/uploads");

        assert_eq!(
            storage.preview_path(doc_id),
            PathBuf::from(
                "/srv/uploads/output/DOC-67e55044-10b1-426f-9247-bb680e5fe0c8_signed_preview.pdf"
            )
        );
        assert_eq!(
            UploadStorage::preview_url(doc_id),
            "/uploads/output/DOC-67e55044-10b1-426f-9247-bb680e5fe0c8_signed_preview.pdf"
        );
        assert_eq!(
            UploadStorage::signature_stored_path(doc_id),
            "/uploads/DOC-67e55044-10b1-426f-9247-bb680e5fe0c8_signature.png"
        );
        Ok(())
    }

    #[tokio::test]
    async fn store_upload_writes_uuid_named_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let storage = UploadStorage::new(dir.path());
        storage.ensure_dirs().await?;

        let upload = storage.store_upload(DocumentFormat::Pdf, b"%PDF-1.5").await?;

        assert_eq!(upload.format(), DocumentFormat::Pdf);
        assert_eq!(upload.path().extension().and_then(|e| e.to_str()), Some("pdf"));
        assert_eq!(tokio::fs::read(upload.path()).await?, b"%PDF-1.5");
        assert!(storage.output_dir().is_dir());
        Ok(())
    }

    #[tokio::test]
    async fn staged_signature_is_renamed_on_commit() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let storage = UploadStorage::new(dir.path());
        let doc_id = DocumentId::new_v4();

        let staged = storage.stage_signature(doc_id, b"png").await?;
        let target = staged.commit().await?;

        assert_eq!(target, dir.path().join(UploadStorage::signature_file_name(doc_id)));
        assert_eq!(tokio::fs::read(&target).await?, b"png");
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn discarded_signature_leaves_nothing_behind() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let storage = UploadStorage::new(dir.path());

        let staged = storage.stage_signature(DocumentId::new_v4(), b"png").await?;
        staged.discard().await;

        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }
}
