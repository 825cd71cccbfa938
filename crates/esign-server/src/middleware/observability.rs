//! Observability middleware for request tracing.
//!
//! Every request gets a unique `x-request-id`, echoed back in the response,
//! and a `tower-http` trace span.

use axum::Router;
use axum::http::header::{self, HeaderName};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::TraceLayer;

/// Header carrying the request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Extension trait for `axum::`[`Router`] to apply observability middleware.
pub trait RouterObservabilityExt<S> {
    /// Layers observability middleware for request tracing and logging.
    ///
    /// This middleware stack generates unique request IDs, adds structured
    /// logging spans for each request, propagates request IDs to responses,
    /// and marks sensitive headers for redaction in logs.
    fn with_observability(self) -> Self;
}

impl<S> RouterObservabilityExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_observability(self) -> Self {
        let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

        self.layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(SetSensitiveRequestHeadersLayer::new([
                header::AUTHORIZATION,
                header::COOKIE,
            ]))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
    }
}
