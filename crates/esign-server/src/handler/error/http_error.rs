//! HTTP error type returned by every handler and extractor.
//!
//! [`Error`] pairs an [`ErrorKind`], which fixes the status code and the
//! default body, with optional overrides for the message, the resource and
//! an internal context string that is logged but never serialized.

use std::borrow::Cow;
use std::fmt;

use aide::generate::GenContext;
use aide::openapi::{Operation, Response as OpenApiResponse};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::extract::Json;
use crate::handler::response::ErrorResponse;

/// The error type for HTTP handlers in the server.
#[derive(Clone)]
#[must_use = "errors do nothing unless serialized"]
pub struct Error<'a> {
    kind: ErrorKind,
    context: Option<Cow<'a, str>>,
    message: Option<Cow<'a, str>>,
    resource: Option<Cow<'a, str>>,
    suggestion: Option<Cow<'a, str>>,
}

impl Error<'static> {
    /// Creates a new [`Error`] with the specified kind.
    #[inline]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
            message: None,
            resource: None,
            suggestion: None,
        }
    }
}

impl<'a> Error<'a> {
    /// Attaches internal context, logged with the response but not sent to the client.
    #[inline]
    pub fn with_context(self, context: impl Into<Cow<'a, str>>) -> Self {
        Self {
            context: Some(context.into()),
            ..self
        }
    }

    /// Replaces the default message of the error kind.
    #[inline]
    pub fn with_message(self, message: impl Into<Cow<'a, str>>) -> Self {
        Self {
            message: Some(message.into()),
            ..self
        }
    }

    /// Sets the resource that caused the error.
    #[inline]
    pub fn with_resource(self, resource: impl Into<Cow<'a, str>>) -> Self {
        Self {
            resource: Some(resource.into()),
            ..self
        }
    }

    /// Attaches a hint telling the client how to fix the request.
    #[inline]
    pub fn with_suggestion(self, suggestion: impl Into<Cow<'a, str>>) -> Self {
        Self {
            suggestion: Some(suggestion.into()),
            ..self
        }
    }

    /// Returns the error kind.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the context if present.
    #[inline]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Returns the custom message if present.
    #[inline]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the resource if present.
    #[inline]
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Converts this error into a static version by cloning all borrowed data.
    pub fn into_static(self) -> Error<'static> {
        Error {
            kind: self.kind,
            context: self.context.map(|c| Cow::Owned(c.into_owned())),
            message: self.message.map(|m| Cow::Owned(m.into_owned())),
            resource: self.resource.map(|r| Cow::Owned(r.into_owned())),
            suggestion: self.suggestion.map(|s| Cow::Owned(s.into_owned())),
        }
    }

    /// Builds the response body, applying the overrides to the kind's defaults.
    pub fn into_error_response(self) -> ErrorResponse<'a> {
        let mut response = self.kind.response();

        if let Some(message) = self.message {
            response = response.with_message(message);
        }

        if let Some(resource) = self.resource {
            response = response.with_resource(resource);
        }

        if let Some(suggestion) = self.suggestion {
            response = response.with_suggestion(suggestion);
        }

        if let Some(context) = self.context {
            response = response.with_context(context);
        }

        response
    }
}

impl Default for Error<'static> {
    #[inline]
    fn default() -> Self {
        Self::new(ErrorKind::default())
    }
}

impl fmt::Debug for Error<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let response = self.kind.response();

        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("status", &response.status)
            .field("message", &self.message.as_deref().unwrap_or(&response.message))
            .field("resource", &self.resource)
            .field("context", &self.context)
            .finish()
    }
}

impl fmt::Display for Error<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let response = self.kind.response();
        let message = self.message.as_deref().unwrap_or(&response.message);

        write!(f, "{} ({}): {}", response.name, response.status, message)?;

        if let Some(ref context) = self.context {
            write!(f, " - {}", context)?;
        }

        if let Some(ref resource) = self.resource {
            write!(f, " [resource: {}]", resource)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error<'_> {}

impl IntoResponse for Error<'_> {
    #[inline]
    fn into_response(self) -> Response {
        self.into_error_response().into_response()
    }
}

impl From<ErrorKind> for Error<'static> {
    #[inline]
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl aide::OperationOutput for Error<'_> {
    type Inner = ErrorResponse<'static>;

    fn operation_response(
        ctx: &mut GenContext,
        operation: &mut Operation,
    ) -> Option<OpenApiResponse> {
        Json::<ErrorResponse<'static>>::operation_response(ctx, operation)
    }
}

/// A specialized [`Result`] type for HTTP handlers.
///
/// [`Result`]: std::result::Result
pub type Result<T, E = Error<'static>> = std::result::Result<T, E>;

/// All HTTP error kinds the server produces.
#[must_use = "error kinds do nothing unless used to create errors"]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // 4xx Client Errors
    /// 400 Bad Request - Missing required path parameter
    MissingPathParam,
    /// 400 Bad Request - Invalid request data
    BadRequest,
    /// 404 Not Found - Resource or route not found
    NotFound,
    /// 408 Request Timeout - Request exceeded the configured timeout
    RequestTimeout,
    /// 409 Conflict - Conflicting resource state
    Conflict,
    /// 413 Payload Too Large - Request body exceeds the server limit
    PayloadTooLarge,

    // 5xx Server Errors
    /// 500 Internal Server Error - Unexpected server error
    #[default]
    InternalServerError,
}

impl ErrorKind {
    /// Converts this error kind into a full [`Error`].
    #[inline]
    pub fn into_error(self) -> Error<'static> {
        Error::new(self)
    }

    /// Creates an [`Error`] with the specified context.
    #[inline]
    pub fn with_context<'a>(self, context: impl Into<Cow<'a, str>>) -> Error<'a> {
        Error::new(self).with_context(context)
    }

    /// Creates an [`Error`] with the specified message.
    #[inline]
    pub fn with_message<'a>(self, message: impl Into<Cow<'a, str>>) -> Error<'a> {
        Error::new(self).with_message(message)
    }

    /// Creates an [`Error`] with the specified resource.
    #[inline]
    pub fn with_resource<'a>(self, resource: impl Into<Cow<'a, str>>) -> Error<'a> {
        Error::new(self).with_resource(resource)
    }

    /// Returns the HTTP status code for this error kind.
    #[inline]
    pub fn status_code(self) -> StatusCode {
        self.response().status
    }

    /// Returns the default response body for this error kind.
    #[inline]
    pub fn response(self) -> ErrorResponse<'static> {
        match self {
            Self::MissingPathParam => ErrorResponse::MISSING_PATH_PARAM,
            Self::BadRequest => ErrorResponse::BAD_REQUEST,
            Self::NotFound => ErrorResponse::NOT_FOUND,
            Self::RequestTimeout => ErrorResponse::REQUEST_TIMEOUT,
            Self::Conflict => ErrorResponse::CONFLICT,
            Self::PayloadTooLarge => ErrorResponse::PAYLOAD_TOO_LARGE,
            Self::InternalServerError => ErrorResponse::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.response().name.as_ref())
    }
}

impl IntoResponse for ErrorKind {
    #[inline]
    fn into_response(self) -> Response {
        self.response().into_response()
    }
}
