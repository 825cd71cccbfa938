//! Application state and dependency injection.

mod config;
mod converter;
mod links;
mod preview;
mod signature;
mod storage;

use esign_postgres::PgClient;

pub use crate::service::config::{ServiceConfig, ServiceConfigBuilder};
pub use crate::service::converter::DocumentConverter;
pub use crate::service::links::DocumentLinks;
pub use crate::service::preview::{PreviewRenderer, RenderedPreview, SignatureOverlay};
pub use crate::service::signature::{
    INVALID_SIGNATURE, NO_SIGNATURE, SignatureImage, SignatureSubmission, require_signature,
};
pub use crate::service::storage::{
    DocumentFormat, MAX_FILE_SIZE, StagedSignature, StoredUpload, UploadStorage,
    is_valid_file_name,
};
// Re-export error types from crate root for convenience
pub use crate::{Error, Result};

/// Application state.
///
/// Used for the [`State`] extraction (dependency injection).
///
/// [`State`]: axum::extract::State
#[must_use = "state does nothing unless you use it"]
#[derive(Clone)]
pub struct ServiceState {
    // External services:
    pub postgres: PgClient,
    pub converter: DocumentConverter,

    // Internal services:
    pub storage: UploadStorage,
    pub renderer: PreviewRenderer,
    pub links: DocumentLinks,
}

impl ServiceState {
    /// Initializes application state from configuration.
    ///
    /// Creates the database pool, applies migrations when enabled and
    /// prepares the uploads directory.
    pub async fn from_config(service_config: &ServiceConfig) -> Result<Self> {
        let service_state = Self {
            postgres: service_config.connect_postgres().await?,
            converter: service_config.create_converter(),

            storage: service_config.open_storage().await?,
            renderer: PreviewRenderer::new(),
            links: service_config.create_links()?,
        };

        Ok(service_state)
    }
}

macro_rules! impl_di {
    ($($f:ident: $t:ty),+) => {$(
        impl axum::extract::FromRef<ServiceState> for $t {
            fn from_ref(state: &ServiceState) -> Self {
                state.$f.clone()
            }
        }
    )+};
}

// External services:
impl_di!(postgres: PgClient);
impl_di!(converter: DocumentConverter);

// Internal services:
impl_di!(storage: UploadStorage);
impl_di!(renderer: PreviewRenderer);
impl_di!(links: DocumentLinks);
