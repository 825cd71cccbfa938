//! Multipart extractor whose rejections use the server error format.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{FromRequest, Multipart as AxumMultipart, Request};
use axum::http::StatusCode;
use derive_more::{Deref, DerefMut, From};

use crate::handler::{Error, ErrorKind};

/// Multipart extractor wrapping [`axum::extract::Multipart`].
///
/// A request that is not `multipart/form-data` carries no file, so it is
/// reported the same way as a form without the expected field.
#[must_use]
#[derive(Debug, Deref, DerefMut, From)]
pub struct Multipart(pub AxumMultipart);

impl Multipart {
    /// Returns the inner Axum Multipart extractor.
    #[inline]
    pub fn into_inner(self) -> AxumMultipart {
        self.0
    }
}

impl<S> FromRequest<S> for Multipart
where
    S: Send + Sync,
{
    type Rejection = Error<'static>;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        AxumMultipart::from_request(req, state)
            .await
            .map(Multipart)
            .map_err(Into::into)
    }
}

impl From<MultipartRejection> for Error<'static> {
    fn from(rejection: MultipartRejection) -> Self {
        match rejection {
            MultipartRejection::InvalidBoundary(_) => ErrorKind::BadRequest
                .with_message("No document file provided")
                .with_context("Content-Type is not multipart/form-data with a boundary"),
            _ => ErrorKind::BadRequest
                .with_message("Invalid multipart request")
                .with_context(rejection.body_text()),
        }
    }
}

impl From<MultipartError> for Error<'static> {
    fn from(error: MultipartError) -> Self {
        if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ErrorKind::BadRequest
                .with_message("File size exceeds the 1MB limit.")
                .with_context(error.body_text());
        }

        ErrorKind::BadRequest
            .with_message("Invalid multipart request")
            .with_context(error.body_text())
    }
}

impl aide::OperationInput for Multipart {
    fn operation_input(
        ctx: &mut aide::generate::GenContext,
        operation: &mut aide::openapi::Operation,
    ) {
        AxumMultipart::operation_input(ctx, operation);
    }
}
