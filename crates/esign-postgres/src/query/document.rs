//! Documents repository for the upload, signing and retrieval workflows.

use std::future::Future;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::model::{Document, NewDocument, SignDocument};
use crate::types::{DocumentId, DocumentStatus};
use crate::{PgConnection, PgError, PgResult, TRACING_TARGET_QUERY, schema};

/// Result of an attempt to sign a document.
#[derive(Debug, Clone, PartialEq)]
pub enum SigningOutcome {
    /// The document was pending and is now signed.
    Signed(Document),
    /// The document had already been signed; it was left untouched.
    AlreadySigned(Document),
    /// No document with the given identifier exists.
    NotFound,
}

/// Repository for document database operations.
pub trait DocumentRepository {
    /// Creates a new document in the `pending` state.
    fn create_document(
        &mut self,
        new_document: NewDocument,
    ) -> impl Future<Output = PgResult<Document>> + Send;

    /// Finds a document by its identifier.
    fn find_document_by_id(
        &mut self,
        doc_id: DocumentId,
    ) -> impl Future<Output = PgResult<Option<Document>>> + Send;

    /// Lists all documents, most recently updated first.
    fn list_documents(&mut self) -> impl Future<Output = PgResult<Vec<Document>>> + Send;

    /// Applies `changes` only if the document is still `pending`.
    ///
    /// Returns `None` when no row matched, either because the document does
    /// not exist or because it is no longer pending.
    fn sign_pending_document(
        &mut self,
        doc_id: DocumentId,
        changes: SignDocument,
    ) -> impl Future<Output = PgResult<Option<Document>>> + Send;

    /// Signs a pending document, telling a missing document apart from one
    /// that was already signed.
    ///
    /// The transition is a single conditional update, so of two concurrent
    /// callers exactly one observes [`SigningOutcome::Signed`].
    fn sign_document(
        &mut self,
        doc_id: DocumentId,
        changes: SignDocument,
    ) -> impl Future<Output = PgResult<SigningOutcome>> + Send;
}

impl DocumentRepository for PgConnection {
    async fn create_document(&mut self, new_document: NewDocument) -> PgResult<Document> {
        use schema::documents;

        let document = diesel::insert_into(documents::table)
            .values(&new_document)
            .returning(Document::as_returning())
            .get_result(self)
            .await
            .map_err(PgError::from)?;

        tracing::debug!(
            target: TRACING_TARGET_QUERY,
            doc_id = %document.doc_id,
            "Document created"
        );

        Ok(document)
    }

    async fn find_document_by_id(&mut self, doc_id: DocumentId) -> PgResult<Option<Document>> {
        use schema::documents::{self, dsl};

        let document = documents::table
            .filter(dsl::doc_id.eq(doc_id.to_string()))
            .select(Document::as_select())
            .first(self)
            .await
            .optional()
            .map_err(PgError::from)?;

        Ok(document)
    }

    async fn list_documents(&mut self) -> PgResult<Vec<Document>> {
        use schema::documents::{self, dsl};

        let documents = documents::table
            .order((dsl::updated_at.desc(), dsl::doc_id.asc()))
            .select(Document::as_select())
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(documents)
    }

    async fn sign_pending_document(
        &mut self,
        doc_id: DocumentId,
        changes: SignDocument,
    ) -> PgResult<Option<Document>> {
        use schema::documents::{self, dsl};

        let document = diesel::update(
            documents::table
                .filter(dsl::doc_id.eq(doc_id.to_string()))
                .filter(dsl::status.eq(DocumentStatus::Pending)),
        )
        .set((&changes, dsl::updated_at.eq(diesel::dsl::now)))
        .returning(Document::as_returning())
        .get_result(self)
        .await
        .optional()
        .map_err(PgError::from)?;

        Ok(document)
    }

    async fn sign_document(
        &mut self,
        doc_id: DocumentId,
        changes: SignDocument,
    ) -> PgResult<SigningOutcome> {
        if let Some(document) = self.sign_pending_document(doc_id, changes).await? {
            tracing::info!(
                target: TRACING_TARGET_QUERY,
                doc_id = %document.doc_id,
                signature_type = ?document.signature_type,
                "Document signed"
            );
            return Ok(SigningOutcome::Signed(document));
        }

        let outcome = match self.find_document_by_id(doc_id).await? {
            Some(document) => SigningOutcome::AlreadySigned(document),
            None => SigningOutcome::NotFound,
        };

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignatureType;
    use crate::{PgClient, PgClientMigrationExt, PgConfig};

    async fn connect() -> anyhow::Result<PgClient> {
        let postgres_url = std::env::var("POSTGRES_URL")?;
        let client = PgClient::new(PgConfig::new(postgres_url))?;
        client.run_pending_migrations().await?;
        Ok(client)
    }

    async fn create_pending(client: &PgClient) -> anyhow::Result<(DocumentId, Document)> {
        let doc_id = DocumentId::new_v4();
        let mut conn = client.get_connection().await?;
        let document = conn
            .create_document(NewDocument::new(doc_id, "contract.pdf", "contract.pdf"))
            .await?;
        Ok((doc_id, document))
    }

    fn typed(signature: &str) -> SignDocument {
        SignDocument::new(signature, SignatureType::Typed)
    }

    #[tokio::test]
    #[ignore] // Requires running Postgres (POSTGRES_URL)
    async fn pending_documents_become_signed() -> anyhow::Result<()> {
        let client = connect().await?;
        let (doc_id, created) = create_pending(&client).await?;
        assert_eq!(created.status, DocumentStatus::Pending);
        assert_eq!(created.signature, None);

        let mut conn = client.get_connection().await?;
        let SigningOutcome::Signed(signed) = conn.sign_document(doc_id, typed("Jane Doe")).await?
        else {
            anyhow::bail!("pending document was not signed");
        };

        assert_eq!(signed.status, DocumentStatus::Signed);
        assert_eq!(signed.signature.as_deref(), Some("Jane Doe"));
        assert_eq!(signed.signature_type, Some(SignatureType::Typed));
        assert_eq!(signed.created_at, created.created_at);

        let created_at = jiff::Timestamp::from(signed.created_at);
        let updated_at = jiff::Timestamp::from(signed.updated_at);
        assert!(updated_at >= created_at);

        let listed = conn.list_documents().await?;
        assert!(listed.iter().any(|document| document == &signed));
        Ok(())
    }

    #[tokio::test]
    #[ignore] // Requires running Postgres (POSTGRES_URL)
    async fn signed_documents_are_left_unchanged() -> anyhow::Result<()> {
        let client = connect().await?;
        let (doc_id, _) = create_pending(&client).await?;

        let mut conn = client.get_connection().await?;
        let SigningOutcome::Signed(signed) = conn.sign_document(doc_id, typed("Jane Doe")).await?
        else {
            anyhow::bail!("first signature was not applied");
        };

        let drawn = SignDocument::new("/uploads/other_signature.png", SignatureType::Drawn);
        let outcome = conn.sign_document(doc_id, drawn).await?;
        assert_eq!(outcome, SigningOutcome::AlreadySigned(signed.clone()));

        let stored = conn.find_document_by_id(doc_id).await?;
        assert_eq!(stored, Some(signed));
        Ok(())
    }

    #[tokio::test]
    #[ignore] // Requires running Postgres (POSTGRES_URL)
    async fn unknown_documents_are_not_found() -> anyhow::Result<()> {
        let client = connect().await?;
        let mut conn = client.get_connection().await?;

        let doc_id = DocumentId::new_v4();
        assert_eq!(conn.find_document_by_id(doc_id).await?, None);

        let outcome = conn.sign_document(doc_id, typed("Jane Doe")).await?;
        assert_eq!(outcome, SigningOutcome::NotFound);
        Ok(())
    }

    #[tokio::test]
    #[ignore] // Requires running Postgres (POSTGRES_URL)
    async fn concurrent_signers_have_one_winner() -> anyhow::Result<()> {
        let client = connect().await?;
        let (doc_id, _) = create_pending(&client).await?;

        let mut first = client.get_connection().await?;
        let mut second = client.get_connection().await?;
        let (a, b) = tokio::join!(
            first.sign_document(doc_id, typed("Alice")),
            second.sign_document(doc_id, typed("Bob")),
        );
        let outcomes = [a?, b?];

        let winners: Vec<_> = outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                SigningOutcome::Signed(document) => Some(document),
                _ => None,
            })
            .collect();
        assert_eq!(winners.len(), 1);

        let losers = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, SigningOutcome::AlreadySigned(_)))
            .count();
        assert_eq!(losers, 1);

        let stored = first.find_document_by_id(doc_id).await?;
        assert_eq!(stored.as_ref(), Some(winners[0]));
        Ok(())
    }
}
