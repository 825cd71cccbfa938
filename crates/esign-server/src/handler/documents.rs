//! Document upload and retrieval handlers.
//!
//! Uploads accept a single PDF or DOCX file. DOCX files are converted to PDF
//! before the document is recorded, so every stored document points at a PDF.

use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::State;
use axum::extract::multipart::Multipart as AxumMultipart;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use esign_postgres::PgClient;
use esign_postgres::model::NewDocument;
use esign_postgres::query::DocumentRepository;
use esign_postgres::types::DocumentId;

use crate::extract::{Json, Multipart, Path, RequestHost};
use crate::handler::request::DocumentPathParams;
use crate::handler::response::{Document, DocumentMessage, Documents, ErrorResponse};
use crate::handler::{ErrorKind, Result};
use crate::service::{
    DocumentConverter, DocumentFormat, DocumentLinks, MAX_FILE_SIZE, ServiceState, UploadStorage,
    is_valid_file_name,
};

/// Tracing target for document operations.
const TRACING_TARGET: &str = "esign_server::handler::documents";

/// Multipart field carrying the uploaded file.
const DOCUMENT_FIELD: &str = "document";

/// A file read from the upload form.
struct UploadedFile {
    name: String,
    format: DocumentFormat,
    bytes: Vec<u8>,
}

/// Lists all documents, most recently updated first.
#[tracing::instrument(skip_all)]
async fn list_documents(State(pg_client): State<PgClient>) -> Result<Json<Documents>> {
    let mut conn = pg_client.get_connection().await?;
    let documents = conn.list_documents().await?;

    tracing::debug!(
        target: TRACING_TARGET,
        document_count = documents.len(),
        "Documents listed"
    );

    Ok(Json(documents.into_iter().map(Document::from).collect()))
}

fn list_documents_docs(op: TransformOperation) -> TransformOperation {
    op.summary("List documents")
        .description("Returns all documents ordered by last update, newest first.")
        .response::<200, Json<Documents>>()
        .response::<500, Json<ErrorResponse>>()
}

/// Uploads a PDF or DOCX document.
///
/// Form data:
/// - `document`: the file to upload, at most 1 MiB
#[tracing::instrument(skip_all)]
async fn upload_document(
    State(pg_client): State<PgClient>,
    State(storage): State<UploadStorage>,
    State(converter): State<DocumentConverter>,
    Multipart(mut multipart): Multipart,
) -> Result<Json<DocumentMessage>> {
    let upload = read_document_field(&mut multipart).await?;

    tracing::debug!(
        target: TRACING_TARGET,
        file_name = %upload.name,
        format = upload.format.extension(),
        size = upload.bytes.len(),
        "Upload received"
    );

    let stored = storage.store_upload(upload.format, &upload.bytes).await?;

    if stored.format() == DocumentFormat::Docx {
        converter
            .convert_to_pdf(stored.path(), storage.root())
            .await
            .map_err(|err| {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %err,
                    path = %stored.path().display(),
                    "DOCX conversion failed"
                );
                ErrorKind::InternalServerError
                    .with_message("Failed to convert DOCX to PDF")
                    .with_resource("document")
                    .with_context(err.to_string())
            })?;
    }

    let new_document = NewDocument::new(DocumentId::new_v4(), upload.name, &stored.pdf_file_name());
    let mut conn = pg_client.get_connection().await?;
    let document = conn.create_document(new_document).await?;

    tracing::info!(
        target: TRACING_TARGET,
        doc_id = %document.doc_id,
        document_path = %document.document_path,
        "Document uploaded"
    );

    Ok(Json(DocumentMessage::new(
        "Document uploaded and converted successfully",
        document,
    )))
}

fn upload_document_docs(op: TransformOperation) -> TransformOperation {
    op.summary("Upload document")
        .description(
            "Stores a PDF or DOCX file in the `document` form field. DOCX files are converted \
             to PDF. Files larger than 1 MiB are rejected.",
        )
        .response::<200, Json<DocumentMessage>>()
        .response::<400, Json<ErrorResponse>>()
        .response::<500, Json<ErrorResponse>>()
}

/// Reads the first file sent in the `document` field.
///
/// Other fields and fields without a file name are skipped.
async fn read_document_field(multipart: &mut AxumMultipart) -> Result<UploadedFile> {
    let no_file = || ErrorKind::BadRequest.with_message("No document file provided");

    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(DOCUMENT_FIELD) {
            continue;
        }

        let Some(name) = field.file_name().map(str::to_owned) else {
            tracing::debug!(target: TRACING_TARGET, "Skipping document field without a file name");
            continue;
        };

        let Some(format) = DocumentFormat::detect(&name, field.content_type()) else {
            return Err(ErrorKind::BadRequest
                .with_message("Only PDF and DOCX files are allowed")
                .with_context(format!(
                    "file name: {name}, content type: {}",
                    field.content_type().unwrap_or("none")
                )));
        };

        if !is_valid_file_name(&name) {
            return Err(ErrorKind::BadRequest
                .with_message("Invalid file name")
                .with_suggestion("File names must be 1 to 255 characters without path separators"));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.chunk().await? {
            if bytes.len() + chunk.len() > MAX_FILE_SIZE {
                return Err(ErrorKind::BadRequest
                    .with_message("File size exceeds the 1MB limit.")
                    .with_context(format!("more than {MAX_FILE_SIZE} bytes received")));
            }
            bytes.extend_from_slice(&chunk);
        }

        if bytes.is_empty() {
            return Err(no_file().with_context("uploaded file is empty"));
        }

        return Ok(UploadedFile {
            name,
            format,
            bytes,
        });
    }

    Err(no_file())
}

/// Returns a document for the signing view.
///
/// The document path is replaced by an absolute download URL.
#[tracing::instrument(skip_all, fields(doc_id = %path_params.doc_id))]
async fn get_esign_document(
    State(pg_client): State<PgClient>,
    State(links): State<DocumentLinks>,
    host: RequestHost,
    Path(path_params): Path<DocumentPathParams>,
) -> Result<Json<Document>> {
    let doc_id = path_params.document_id()?;

    let mut conn = pg_client.get_connection().await?;
    let Some(document) = conn.find_document_by_id(doc_id).await? else {
        return Err(ErrorKind::NotFound
            .with_message("Document not found")
            .with_resource("document"));
    };

    let url = links.pdf_url(doc_id, host.as_deref());
    Ok(Json(Document::from(document).with_document_url(url)))
}

fn get_esign_document_docs(op: TransformOperation) -> TransformOperation {
    op.summary("Get document for signing")
        .description("Returns the document with `documentPath` set to an absolute PDF download URL.")
        .response::<200, Json<Document>>()
        .response::<404, Json<ErrorResponse>>()
}

/// Streams the stored PDF of a document.
#[tracing::instrument(skip_all, fields(doc_id = %path_params.doc_id))]
async fn get_document_pdf(
    State(pg_client): State<PgClient>,
    State(storage): State<UploadStorage>,
    Path(path_params): Path<DocumentPathParams>,
) -> Result<(StatusCode, HeaderMap, Vec<u8>)> {
    let doc_id = path_params.document_id()?;

    let mut conn = pg_client.get_connection().await?;
    let Some(document) = conn.find_document_by_id(doc_id).await? else {
        return Err(ErrorKind::NotFound
            .with_message("Document not found")
            .with_resource("document"));
    };
    drop(conn);

    let file_not_found = || {
        ErrorKind::NotFound
            .with_message("File not found")
            .with_resource("document")
    };

    let (Some(file_name), Some(path)) = (document.file_name(), storage.document_file(&document))
    else {
        return Err(file_not_found().with_context(document.document_path.clone()));
    };

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(
                target: TRACING_TARGET,
                path = %path.display(),
                "Stored PDF is missing"
            );
            return Err(file_not_found());
        }
        Err(err) => {
            return Err(ErrorKind::InternalServerError
                .with_message("Failed to read document")
                .with_context(err.to_string()));
        }
    };

    let disposition = HeaderValue::try_from(format!("inline; filename=\"{file_name}\""))
        .map_err(|err| ErrorKind::InternalServerError.with_context(err.to_string()))?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(DocumentFormat::PDF_MIME));
    headers.insert(CONTENT_DISPOSITION, disposition);

    tracing::debug!(
        target: TRACING_TARGET,
        size = bytes.len(),
        "Document PDF served"
    );

    Ok((StatusCode::OK, headers, bytes))
}

fn get_document_pdf_docs(op: TransformOperation) -> TransformOperation {
    op.summary("Download document PDF")
        .description("Streams the stored PDF inline with `Content-Type: application/pdf`.")
        .response::<404, Json<ErrorResponse>>()
}

/// Returns a [`Router`] with all document routes.
///
/// [`Router`]: axum::routing::Router
pub fn routes() -> ApiRouter<ServiceState> {
    use aide::axum::routing::*;

    ApiRouter::new()
        .api_route(
            "/api/documents",
            get_with(list_documents, list_documents_docs),
        )
        .api_route(
            "/api/documents/upload",
            post_with(upload_document, upload_document_docs),
        )
        .api_route(
            "/api/esign/{docId}",
            get_with(get_esign_document, get_esign_document_docs),
        )
        .api_route(
            "/api/documents/uploads/{docId}/pdf",
            get_with(get_document_pdf, get_document_pdf_docs),
        )
        .with_path_items(|item| item.tag("Documents"))
}
