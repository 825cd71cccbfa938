//! Document signing handler.

use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::State;
use esign_postgres::PgClient;
use esign_postgres::model::SignDocument;
use esign_postgres::query::{DocumentRepository, SigningOutcome};

use crate::extract::{Json, Path};
use crate::handler::request::{DocumentPathParams, SignDocumentRequest};
use crate::handler::response::{DocumentMessage, ErrorResponse};
use crate::handler::{Error, ErrorKind, Result};
use crate::service::{
    ServiceState, SignatureImage, SignatureSubmission, StagedSignature, UploadStorage,
    require_signature,
};

/// Tracing target for signing operations.
const TRACING_TARGET: &str = "esign_server::handler::signatures";

fn already_signed() -> Error<'static> {
    ErrorKind::Conflict
        .with_message("Document has already been signed")
        .with_resource("document")
}

fn document_not_found() -> Error<'static> {
    ErrorKind::NotFound
        .with_message("Document not found")
        .with_resource("document")
}

/// Signs a pending document with a typed or drawn signature.
///
/// Checks run in a fixed order: a missing signature, then the document
/// (unknown or already signed), then the signature format. The transition
/// itself is a single conditional update, so of two concurrent signers
/// exactly one succeeds.
#[tracing::instrument(skip_all, fields(doc_id = %path_params.doc_id))]
async fn sign_document(
    State(pg_client): State<PgClient>,
    State(storage): State<UploadStorage>,
    Path(path_params): Path<DocumentPathParams>,
    Json(request): Json<SignDocumentRequest>,
) -> Result<Json<DocumentMessage>> {
    let signature = require_signature(request.signature.as_deref())?;
    let doc_id = path_params.document_id()?;

    let mut conn = pg_client.get_connection().await?;
    match conn.find_document_by_id(doc_id).await? {
        None => return Err(document_not_found()),
        Some(document) if document.is_signed() => {
            tracing::warn!(target: TRACING_TARGET, "Document has already been signed");
            return Err(already_signed());
        }
        Some(_) => {}
    }

    let submission =
        SignatureSubmission::parse(Some(signature), request.signature_type.as_deref())?;
    let signature_type = submission.signature_type();

    let (signature, staged) = match submission {
        SignatureSubmission::Typed(text) => (text, None),
        SignatureSubmission::Drawn(data_url) => {
            let image = SignatureImage::decode(data_url).await?;
            let (width, height) = image.dimensions();
            tracing::debug!(
                target: TRACING_TARGET,
                width,
                height,
                "Drawn signature decoded"
            );

            let staged = storage.stage_signature(doc_id, image.as_png()).await?;
            (UploadStorage::signature_stored_path(doc_id), Some(staged))
        }
    };

    let changes = SignDocument::new(signature, signature_type);
    let outcome = conn.sign_document(doc_id, changes).await;

    let document = match outcome {
        Ok(SigningOutcome::Signed(document)) => document,
        Ok(SigningOutcome::AlreadySigned(_)) => {
            discard(staged).await;
            tracing::warn!(target: TRACING_TARGET, "Document was signed concurrently");
            return Err(already_signed());
        }
        Ok(SigningOutcome::NotFound) => {
            discard(staged).await;
            return Err(document_not_found());
        }
        Err(err) => {
            discard(staged).await;
            return Err(err.into());
        }
    };

    if let Some(staged) = staged {
        staged.commit().await?;
    }

    tracing::info!(
        target: TRACING_TARGET,
        signature_type = %signature_type,
        "Document signed"
    );

    Ok(Json(DocumentMessage::new(
        "E-signature uploaded successfully",
        document,
    )))
}

async fn discard(staged: Option<StagedSignature>) {
    if let Some(staged) = staged {
        staged.discard().await;
    }
}

fn sign_document_docs(op: TransformOperation) -> TransformOperation {
    op.summary("Sign document")
        .description(
            "Signs a pending document. `signatureType` is `typed` with the signature text, or \
             `drawn` with a `data:image/<fmt>;base64,...` URL that is stored as PNG.",
        )
        .response::<200, Json<DocumentMessage>>()
        .response::<400, Json<ErrorResponse>>()
        .response::<404, Json<ErrorResponse>>()
        .response::<409, Json<ErrorResponse>>()
}

/// Returns a [`Router`] with all signing routes.
///
/// [`Router`]: axum::routing::Router
pub fn routes() -> ApiRouter<ServiceState> {
    use aide::axum::routing::*;

    ApiRouter::new()
        .api_route(
            "/api/documents/{docId}/sign",
            post_with(sign_document, sign_document_docs),
        )
        .with_path_items(|item| item.tag("Signatures"))
}

#[cfg(test)]
mod tests {
    use esign_postgres::model::SignDocument;
    use esign_postgres::query::DocumentRepository;
    use esign_postgres::types::{DocumentId, DocumentStatus, SignatureType};
    use serde_json::json;

    use crate::handler::test::{
        create_database_test_server, create_pending_document, create_test_server,
    };

    fn sign_path(doc_id: DocumentId) -> String {
        format!("/api/documents/{doc_id}/sign")
    }

    #[tokio::test]
    async fn empty_signature_is_rejected_before_the_lookup() -> anyhow::Result<()> {
        let (server, _uploads) = create_test_server().await?;

        for body in [
            json!({ "signature": "", "signatureType": "typed" }),
            json!({ "signatureType": "drawn" }),
            json!({ "signature": "", "signatureType": "stamp" }),
        ] {
            let response = server.post(&sign_path(DocumentId::new_v4())).json(&body).await;
            response.assert_status_bad_request();

            let body = response.json::<serde_json::Value>();
            assert_eq!(body["message"], "No signature provided");
        }

        // The id is not even parsed without a signature.
        let response = server
            .post("/api/documents/not-a-document/sign")
            .json(&json!({ "signatureType": "typed" }))
            .await;
        response.assert_status_bad_request();
        Ok(())
    }

    #[tokio::test]
    async fn malformed_ids_are_not_found() -> anyhow::Result<()> {
        let (server, _uploads) = create_test_server().await?;

        for body in [
            json!({ "signature": "Jane Doe", "signatureType": "typed" }),
            json!({ "signature": "Jane Doe", "signatureType": "stamp" }),
        ] {
            let response = server
                .post("/api/documents/not-a-document/sign")
                .json(&body)
                .await;

            response.assert_status_not_found();
            let body = response.json::<serde_json::Value>();
            assert_eq!(body["message"], "Document not found");
        }
        Ok(())
    }

    #[tokio::test]
    async fn non_string_fields_are_bad_requests() -> anyhow::Result<()> {
        let (server, _uploads) = create_test_server().await?;

        let response = server
            .post(&sign_path(DocumentId::new_v4()))
            .json(&json!({ "signature": 42, "signatureType": "typed" }))
            .await;

        response.assert_status_bad_request();
        Ok(())
    }

    #[tokio::test]
    #[ignore] // Requires running Postgres (POSTGRES_URL)
    async fn unknown_documents_are_not_found_before_format_checks() -> anyhow::Result<()> {
        let (server, _state, _uploads) = create_database_test_server().await?;

        for body in [
            json!({ "signature": "Jane Doe", "signatureType": "typed" }),
            json!({ "signature": "Jane Doe", "signatureType": "stamp" }),
            json!({ "signature": "Jane Doe", "signatureType": "drawn" }),
        ] {
            let response = server.post(&sign_path(DocumentId::new_v4())).json(&body).await;
            response.assert_status_not_found();

            let body = response.json::<serde_json::Value>();
            assert_eq!(body["message"], "Document not found");
        }
        Ok(())
    }

    #[tokio::test]
    #[ignore] // Requires running Postgres (POSTGRES_URL)
    async fn invalid_signatures_are_rejected() -> anyhow::Result<()> {
        let (server, state, uploads) = create_database_test_server().await?;
        let doc_id = create_pending_document(&state).await?;

        for body in [
            json!({ "signature": "Jane Doe", "signatureType": "stamp" }),
            json!({ "signature": "Jane Doe" }),
            json!({ "signature": "   ", "signatureType": "typed" }),
            json!({ "signature": "Jane Doe", "signatureType": "drawn" }),
            json!({ "signature": "data:image/png;base64,!!!", "signatureType": "drawn" }),
        ] {
            let response = server.post(&sign_path(doc_id)).json(&body).await;
            response.assert_status_bad_request();

            let body = response.json::<serde_json::Value>();
            assert_eq!(body["message"], "Invalid signature format or type");
        }

        // Rejected drawn signatures leave nothing behind.
        let entries = std::fs::read_dir(uploads.path())?.count();
        assert_eq!(entries, 1);

        let mut conn = state.postgres.get_connection().await?;
        let document = conn.find_document_by_id(doc_id).await?;
        assert_eq!(document.map(|d| d.status), Some(DocumentStatus::Pending));
        Ok(())
    }

    #[tokio::test]
    #[ignore] // Requires running Postgres (POSTGRES_URL)
    async fn typed_signatures_sign_pending_documents() -> anyhow::Result<()> {
        let (server, state, _uploads) = create_database_test_server().await?;
        let doc_id = create_pending_document(&state).await?;

        let response = server
            .post(&sign_path(doc_id))
            .json(&json!({ "signature": "  Jane Doe ", "signatureType": "typed" }))
            .await;
        response.assert_status_ok();

        let body = response.json::<serde_json::Value>();
        assert_eq!(body["message"], "E-signature uploaded successfully");
        assert_eq!(body["document"]["docId"], doc_id.to_string());
        assert_eq!(body["document"]["status"], "signed");
        assert_eq!(body["document"]["signature"], "Jane Doe");
        assert_eq!(body["document"]["signatureType"], "typed");
        Ok(())
    }

    #[tokio::test]
    #[ignore] // Requires running Postgres (POSTGRES_URL)
    async fn signed_documents_conflict_before_format_checks() -> anyhow::Result<()> {
        let (server, state, _uploads) = create_database_test_server().await?;
        let doc_id = create_pending_document(&state).await?;

        let mut conn = state.postgres.get_connection().await?;
        conn.sign_document(doc_id, SignDocument::new("Jane Doe", SignatureType::Typed))
            .await?;
        let signed = conn.find_document_by_id(doc_id).await?;

        for body in [
            json!({ "signature": "John Roe", "signatureType": "typed" }),
            json!({ "signature": "John Roe", "signatureType": "stamp" }),
        ] {
            let response = server.post(&sign_path(doc_id)).json(&body).await;
            response.assert_status_conflict();

            let body = response.json::<serde_json::Value>();
            assert_eq!(body["message"], "Document has already been signed");
        }

        assert_eq!(conn.find_document_by_id(doc_id).await?, signed);
        Ok(())
    }

    #[tokio::test]
    #[ignore] // Requires running Postgres (POSTGRES_URL)
    async fn concurrent_requests_sign_once() -> anyhow::Result<()> {
        let (server, state, _uploads) = create_database_test_server().await?;
        let doc_id = create_pending_document(&state).await?;
        let path = sign_path(doc_id);

        let sign_as = |name: &'static str| {
            let request = server
                .post(&path)
                .json(&json!({ "signature": name, "signatureType": "typed" }));
            async move { request.await }
        };
        let (first, second) = tokio::join!(sign_as("Alice"), sign_as("Bob"));

        let mut codes = [first.status_code().as_u16(), second.status_code().as_u16()];
        codes.sort_unstable();
        assert_eq!(codes, [200, 409]);
        Ok(())
    }
}
