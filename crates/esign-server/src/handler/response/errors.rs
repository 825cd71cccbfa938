use std::borrow::Cow;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use schemars::JsonSchema;
use serde::Serialize;

/// JSON body of every error response.
///
/// `context` and `status` are kept for logging and never serialized.
#[must_use = "error responses do nothing unless serialized"]
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse<'a> {
    /// The error name/type identifier
    pub name: Cow<'a, str>,
    /// User-friendly error message safe for client display
    pub message: Cow<'a, str>,
    /// The resource that the error relates to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Cow<'a, str>>,
    /// Helpful suggestion for resolving the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<Cow<'a, str>>,

    /// Internal context for debugging
    #[serde(skip)]
    pub context: Option<Cow<'a, str>>,
    /// HTTP status code
    #[serde(skip)]
    pub status: StatusCode,
}

impl<'a> ErrorResponse<'a> {
    // 4xx Client Errors
    pub const BAD_REQUEST: Self = Self::new(
        "bad_request",
        "Invalid request data.",
        StatusCode::BAD_REQUEST,
    );
    pub const CONFLICT: Self =
        Self::new("conflict", "Resource state conflict.", StatusCode::CONFLICT);
    pub const MISSING_PATH_PARAM: Self = Self::new(
        "missing_path_param",
        "Missing path parameter.",
        StatusCode::BAD_REQUEST,
    );
    pub const NOT_FOUND: Self =
        Self::new("not_found", "Resource not found.", StatusCode::NOT_FOUND);
    pub const PAYLOAD_TOO_LARGE: Self = Self::new(
        "payload_too_large",
        "Payload too large.",
        StatusCode::PAYLOAD_TOO_LARGE,
    );
    pub const REQUEST_TIMEOUT: Self = Self::new(
        "request_timeout",
        "Request timed out.",
        StatusCode::REQUEST_TIMEOUT,
    );
    // 5xx Server Errors
    pub const INTERNAL_SERVER_ERROR: Self = Self::new(
        "internal_server_error",
        "Internal server error.",
        StatusCode::INTERNAL_SERVER_ERROR,
    );

    /// Creates a new error response.
    #[inline]
    pub const fn new(name: &'a str, message: &'a str, status: StatusCode) -> Self {
        Self {
            name: Cow::Borrowed(name),
            message: Cow::Borrowed(message),
            resource: None,
            suggestion: None,
            context: None,
            status,
        }
    }

    /// Replaces the client-facing message.
    pub fn with_message(mut self, message: impl Into<Cow<'a, str>>) -> Self {
        self.message = message.into();
        self
    }

    /// Sets the resource, nesting it under an existing one with a `/` separator.
    pub fn with_resource(mut self, resource: impl Into<Cow<'a, str>>) -> Self {
        let new_resource = resource.into();
        self.resource = Some(match self.resource {
            Some(existing) => Cow::Owned(format!("{}/{}", existing, new_resource)),
            None => new_resource,
        });
        self
    }

    /// Attaches context, merging with existing context using a `; ` separator.
    pub fn with_context(mut self, context: impl Into<Cow<'a, str>>) -> Self {
        let new_context = context.into();
        self.context = Some(match self.context {
            Some(existing) => Cow::Owned(format!("{}; {}", existing, new_context)),
            None => new_context,
        });
        self
    }

    /// Attaches a suggestion, merging with an existing one using a `; ` separator.
    pub fn with_suggestion(mut self, suggestion: impl Into<Cow<'a, str>>) -> Self {
        let new_suggestion = suggestion.into();
        self.suggestion = Some(match self.suggestion {
            Some(existing) => Cow::Owned(format!("{}; {}", existing, new_suggestion)),
            None => new_suggestion,
        });
        self
    }
}

impl Default for ErrorResponse<'_> {
    #[inline]
    fn default() -> Self {
        Self::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ErrorResponse<'_> {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = %self.status,
                name = %self.name,
                message = %self.message,
                resource = ?self.resource,
                context = ?self.context,
                "HTTP error response"
            );
        } else {
            tracing::warn!(
                status = %self.status,
                name = %self.name,
                message = %self.message,
                resource = ?self.resource,
                context = ?self.context,
                "HTTP error response"
            );
        }

        (self.status, Json(self)).into_response()
    }
}
