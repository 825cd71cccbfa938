//! Extractor for the `Host` request header.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::header::HOST;
use axum::http::request::Parts;

/// The `Host` header of the request, if present and valid ASCII.
///
/// HTTP/2 requests carry the host in the URI authority instead, which is
/// used as a fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHost(pub Option<String>);

impl RequestHost {
    /// Returns the host, including the port when one was sent.
    #[inline]
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for RequestHost
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let host = parts
            .headers
            .get(HOST)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
            .or_else(|| parts.uri.authority().map(|a| a.as_str().to_owned()))
            .filter(|host| !host.is_empty());

        Ok(Self(host))
    }
}

impl aide::OperationInput for RequestHost {}
