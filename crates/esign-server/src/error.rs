//! Service layer error types and utilities.
//!
//! Services report failures with [`Error`], which carries an [`ErrorKind`]
//! for categorization, a message and an optional source error. The HTTP
//! layer maps the kind onto a status code.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

/// Type alias for boxed errors that are Send + Sync.
pub type BoxedError = Box<dyn StdError + Send + Sync>;

/// Result type alias for service layer operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error kind enumeration for categorizing service layer errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Configuration-related errors.
    Config,
    /// File system operation errors.
    FileSystem,
    /// Caller-supplied data that cannot be processed.
    InvalidInput,
    /// Document format conversion errors.
    Conversion,
    /// PDF rendering errors.
    Render,
    /// Internal service logic errors.
    Internal,
}

impl ErrorKind {
    /// Returns the error kind as a string for categorization.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::FileSystem => "file_system",
            Self::InvalidInput => "invalid_input",
            Self::Conversion => "conversion",
            Self::Render => "render",
            Self::Internal => "internal_service",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service layer error with structured information.
#[derive(Debug, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: Cow<'static, str>,
    #[source]
    source: Option<BoxedError>,
}

impl Error {
    #[inline]
    fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches a source error to this error.
    #[inline]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error kind.
    #[must_use]
    #[inline]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[must_use]
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Creates a new configuration error.
    #[inline]
    pub fn config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// Creates a new file system error.
    #[inline]
    pub fn file_system(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::FileSystem, message)
    }

    /// Creates a new invalid input error.
    #[inline]
    pub fn invalid_input(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    /// Creates a new conversion error.
    #[inline]
    pub fn conversion(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Conversion, message)
    }

    /// Creates a new rendering error.
    #[inline]
    pub fn render(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Render, message)
    }

    /// Creates a new internal service error, prefixed with the service name.
    #[inline]
    pub fn internal(
        service: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        let full_message = format!("{}: {}", service.into(), message.into());
        Self::new(ErrorKind::Internal, full_message)
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::render(err.to_string()).with_source(err)
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::internal("runtime", "blocking task failed").with_source(err)
    }
}
