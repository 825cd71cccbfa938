use axum::extract::rejection::PathRejection;
use axum::extract::{FromRequestParts, Path as AxumPath};
use axum::http::request::Parts;
use derive_more::{Deref, DerefMut, From};
use serde::de::DeserializeOwned;

use crate::handler::{Error, ErrorKind};

/// Path parameter extractor wrapping [`axum::extract::Path`].
///
/// Deserialization failures become `400 Bad Request`, a missing parameter
/// becomes [`ErrorKind::MissingPathParam`].
#[must_use]
#[derive(Debug, Clone, Copy, Default, Deref, DerefMut, From)]
pub struct Path<T>(pub T);

impl<T> Path<T> {
    /// Returns the inner path parameters.
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T, S> FromRequestParts<S> for Path<T>
where
    T: DeserializeOwned + Send + 'static,
    S: Send + Sync,
{
    type Rejection = Error<'static>;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let extractor =
            <AxumPath<T> as FromRequestParts<S>>::from_request_parts(parts, state).await;
        extractor.map(|x| Self(x.0)).map_err(Into::into)
    }
}

impl From<PathRejection> for Error<'static> {
    fn from(rejection: PathRejection) -> Self {
        match rejection {
            PathRejection::FailedToDeserializePathParams(err) => ErrorKind::BadRequest
                .with_message("Invalid path parameter format")
                .with_context(err.body_text()),
            PathRejection::MissingPathParams(err) => ErrorKind::MissingPathParam
                .with_message("Required path parameter missing")
                .with_context(err.body_text()),
            other => ErrorKind::InternalServerError
                .with_message("Path processing failed")
                .with_context(other.body_text()),
        }
    }
}

impl<T> aide::OperationInput for Path<T>
where
    T: schemars::JsonSchema,
{
    fn operation_input(
        ctx: &mut aide::generate::GenContext,
        operation: &mut aide::openapi::Operation,
    ) {
        AxumPath::<T>::operation_input(ctx, operation);
    }
}
