//! Signed preview generation.

use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::State;
use esign_postgres::PgClient;
use esign_postgres::model;
use esign_postgres::query::DocumentRepository;
use esign_postgres::types::SignatureType;

use crate::extract::{Json, Path};
use crate::handler::request::DocumentPathParams;
use crate::handler::response::{ErrorResponse, Preview};
use crate::handler::{Error, ErrorKind, Result};
use crate::service::{PreviewRenderer, ServiceState, SignatureOverlay, UploadStorage};

/// Tracing target for preview operations.
const TRACING_TARGET: &str = "esign_server::handler::previews";

fn preview_failed(reason: impl std::fmt::Display) -> Error<'static> {
    ErrorKind::InternalServerError
        .with_message(format!("Error previewing document: {reason}"))
        .with_resource("document")
}

/// Draws the signature onto the last page of a signed document.
///
/// The preview is written to the output directory and replaces any earlier
/// preview of the same document.
#[tracing::instrument(skip_all, fields(doc_id = %path_params.doc_id))]
async fn preview_document(
    State(pg_client): State<PgClient>,
    State(storage): State<UploadStorage>,
    State(renderer): State<PreviewRenderer>,
    Path(path_params): Path<DocumentPathParams>,
) -> Result<Json<Preview>> {
    let doc_id = path_params.document_id()?;

    let mut conn = pg_client.get_connection().await?;
    let Some(document) = conn.find_document_by_id(doc_id).await? else {
        return Err(ErrorKind::NotFound
            .with_message("Document not found")
            .with_resource("document"));
    };
    drop(conn);

    let source = match storage.document_file(&document) {
        Some(path) if tokio::fs::try_exists(&path).await.unwrap_or(false) => path,
        _ => {
            tracing::warn!(
                target: TRACING_TARGET,
                document_path = %document.document_path,
                "Source file is missing"
            );
            return Err(preview_failed("file not found"));
        }
    };

    let overlay = signature_overlay(&storage, &document).await?;
    let label = overlay.label();

    storage.ensure_dirs().await?;
    let output = storage.preview_path(doc_id);

    let page_count = renderer
        .render(source, overlay, output)
        .await
        .map_err(|err| {
            tracing::error!(
                target: TRACING_TARGET,
                error = %err,
                "Preview rendering failed"
            );
            preview_failed(err.message()).with_context(err.to_string())
        })?;

    tracing::info!(
        target: TRACING_TARGET,
        signature_type = label,
        page_count,
        "Preview generated"
    );

    Ok(Json(Preview {
        message: format!("PDF preview with {label} signature generated successfully"),
        preview_url: UploadStorage::preview_url(doc_id),
    }))
}

/// Builds the overlay for a signed PDF document.
async fn signature_overlay(
    storage: &UploadStorage,
    document: &model::Document,
) -> Result<SignatureOverlay> {
    let unsupported = || {
        ErrorKind::BadRequest
            .with_message("Unsupported document type for preview")
            .with_resource("document")
    };

    if !document.is_pdf() {
        return Err(unsupported().with_context(document.document_path.clone()));
    }

    match (document.signature_type, document.signature.as_deref()) {
        (Some(SignatureType::Typed), Some(text)) => Ok(SignatureOverlay::Typed(text.to_owned())),
        (Some(SignatureType::Drawn), Some(stored_path)) => {
            let Some(path) = storage.resolve(stored_path) else {
                return Err(preview_failed("signature image not found"));
            };

            let png = tokio::fs::read(&path).await.map_err(|err| {
                preview_failed("signature image not found").with_context(err.to_string())
            })?;

            Ok(SignatureOverlay::Drawn(png))
        }
        _ => Err(unsupported().with_context("document is not signed")),
    }
}

fn preview_document_docs(op: TransformOperation) -> TransformOperation {
    op.summary("Preview signed document")
        .description(
            "Renders the signature onto the last page of the document PDF and returns the \
             preview location, relative to `/api`.",
        )
        .response::<200, Json<Preview>>()
        .response::<400, Json<ErrorResponse>>()
        .response::<404, Json<ErrorResponse>>()
        .response::<500, Json<ErrorResponse>>()
}

/// Returns a [`Router`] with all preview routes.
///
/// [`Router`]: axum::routing::Router
pub fn routes() -> ApiRouter<ServiceState> {
    use aide::axum::routing::*;

    ApiRouter::new()
        .api_route(
            "/api/documents/{docId}/preview",
            get_with(preview_document, preview_document_docs),
        )
        .with_path_items(|item| item.tag("Previews"))
}

#[cfg(test)]
mod tests {
    use esign_postgres::types::DocumentId;

    use crate::handler::test::{create_database_test_server, create_test_server};

    #[tokio::test]
    async fn malformed_ids_are_not_found() -> anyhow::Result<()> {
        let (server, _uploads) = create_test_server().await?;

        let response = server.get("/api/documents/DOC-123/preview").await;
        response.assert_status_not_found();

        let body = response.json::<serde_json::Value>();
        assert_eq!(body["message"], "Document not found");
        assert_eq!(body["resource"], "document");
        Ok(())
    }

    #[tokio::test]
    #[ignore] // Requires running Postgres (POSTGRES_URL)
    async fn unknown_documents_are_not_found() -> anyhow::Result<()> {
        let (server, _state, _uploads) = create_database_test_server().await?;

        let path = format!("/api/documents/{}/preview", DocumentId::new_v4());
        let response = server.get(&path).await;
        response.assert_status_not_found();

        let body = response.json::<serde_json::Value>();
        assert_eq!(body["message"], "Document not found");
        Ok(())
    }
}
