//! All `axum::`[`Router`]s with related `axum::`[`Handler`]s.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use aide::openapi::OpenApi;
//! use esign_server::handler::{routes, with_static_routes};
//! use esign_server::service::{ServiceConfig, ServiceState};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServiceConfig::builder().build()?;
//! let state = ServiceState::from_config(&config).await?;
//!
//! let router = routes().finish_api(&mut OpenApi::default());
//! let app: axum::Router = with_static_routes(router, &state).with_state(state);
//! # Ok(())
//! # }
//! ```
//!
//! [`Router`]: axum::routing::Router
//! [`Handler`]: axum::handler::Handler

mod documents;
mod error;
mod previews;
mod request;
mod response;
mod signatures;

use aide::axum::ApiRouter;
use axum::Router;
use axum::http::Uri;
use tower_http::services::ServeDir;

pub use crate::handler::error::{Error, ErrorKind, Result};
use crate::service::ServiceState;

/// Mount point of the uploads directory.
pub const UPLOADS_MOUNT: &str = "/api/uploads";

async fn route_not_found(uri: Uri) -> Error<'static> {
    ErrorKind::NotFound
        .with_message("Route not found")
        .with_context(uri.to_string())
}

/// Returns an [`ApiRouter`] with all documented API routes.
pub fn routes() -> ApiRouter<ServiceState> {
    ApiRouter::new()
        .merge(documents::routes())
        .merge(signatures::routes())
        .merge(previews::routes())
}

/// Adds the uploads mount and the not-found fallback.
///
/// Both sit outside the OpenAPI document, so they are added to the finished
/// [`Router`].
pub fn with_static_routes(
    router: Router<ServiceState>,
    state: &ServiceState,
) -> Router<ServiceState> {
    router
        .nest_service(UPLOADS_MOUNT, ServeDir::new(state.storage.root()))
        .fallback(route_not_found)
}

#[cfg(test)]
mod test {
    use aide::axum::ApiRouter;
    use aide::openapi::OpenApi;
    use axum_test::TestServer;
    use esign_postgres::PgConfig;
    use esign_postgres::model::NewDocument;
    use esign_postgres::query::DocumentRepository;
    use esign_postgres::types::DocumentId;
    use tempfile::TempDir;

    use crate::handler::{routes, with_static_routes};
    use crate::service::{ServiceConfig, ServiceState};

    /// Returns a new [`ServiceState`] backed by a temporary uploads directory.
    ///
    /// The database is never contacted, so only requests rejected before
    /// reaching the store can be exercised.
    pub async fn create_test_state() -> anyhow::Result<(ServiceState, TempDir)> {
        let uploads = tempfile::tempdir()?;
        let config = ServiceConfig::builder()
            .with_uploads_dir(uploads.path())
            .with_postgres_run_migrations(false)
            .build()?;

        let state = ServiceState::from_config(&config).await?;
        Ok((state, uploads))
    }

    /// Returns a new [`TestServer`] with the given router and state.
    pub async fn create_test_server_with_state(
        router: ApiRouter<ServiceState>,
        state: ServiceState,
    ) -> anyhow::Result<TestServer> {
        let router = router.finish_api(&mut OpenApi::default());
        let app = with_static_routes(router, &state).with_state(state);
        let server = TestServer::new(app)?;
        Ok(server)
    }

    /// Returns a new [`TestServer`] with the default router.
    ///
    /// The uploads directory lives as long as the returned [`TempDir`].
    pub async fn create_test_server() -> anyhow::Result<(TestServer, TempDir)> {
        let (state, uploads) = create_test_state().await?;
        let server = create_test_server_with_state(routes(), state).await?;
        Ok((server, uploads))
    }

    /// Returns a new [`TestServer`] backed by the database at `POSTGRES_URL`.
    ///
    /// Migrations are applied, and the returned [`ServiceState`] shares the
    /// server's pool so tests can seed documents.
    pub async fn create_database_test_server()
    -> anyhow::Result<(TestServer, ServiceState, TempDir)> {
        let postgres_url = std::env::var("POSTGRES_URL")?;
        let uploads = tempfile::tempdir()?;
        let config = ServiceConfig::builder()
            .with_postgres(PgConfig::new(postgres_url))
            .with_uploads_dir(uploads.path())
            .build()?;

        let state = ServiceState::from_config(&config).await?;
        let server = create_test_server_with_state(routes(), state.clone()).await?;
        Ok((server, state, uploads))
    }

    /// Inserts a pending document into the test database.
    pub async fn create_pending_document(state: &ServiceState) -> anyhow::Result<DocumentId> {
        let doc_id = DocumentId::new_v4();
        let mut conn = state.postgres.get_connection().await?;
        conn.create_document(NewDocument::new(doc_id, "contract.pdf", "contract.pdf"))
            .await?;
        Ok(doc_id)
    }

    #[tokio::test]
    async fn handlers() -> anyhow::Result<()> {
        let (server, _uploads) = create_test_server().await?;
        assert!(server.is_running());
        Ok(())
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() -> anyhow::Result<()> {
        let (server, _uploads) = create_test_server().await?;

        let response = server.get("/api/unknown").await;
        response.assert_status_not_found();

        let body = response.json::<serde_json::Value>();
        assert_eq!(body["message"], "Route not found");
        assert_eq!(body["name"], "not_found");
        Ok(())
    }

    #[tokio::test]
    async fn uploads_are_served_statically() -> anyhow::Result<()> {
        let (server, uploads) = create_test_server().await?;
        std::fs::write(uploads.path().join("hello.txt"), b"hello")?;

        let response = server.get("/api/uploads/hello.txt").await;
        response.assert_status_ok();
        assert_eq!(response.as_bytes().as_ref(), b"hello");
        Ok(())
    }
}
