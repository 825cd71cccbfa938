//! Service error to HTTP error conversion.

use super::http_error::{Error as HttpError, ErrorKind};
use crate::{Error as ServiceError, ErrorKind as ServiceErrorKind};

/// Tracing target for service error conversions.
const TRACING_TARGET: &str = "esign_server::handler::service";

impl From<ServiceError> for HttpError<'static> {
    fn from(error: ServiceError) -> Self {
        match error.kind() {
            ServiceErrorKind::InvalidInput => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    error = %error,
                    "Invalid input"
                );
            }
            ServiceErrorKind::Conversion => {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %error,
                    source = ?std::error::Error::source(&error),
                    error_kind = %error.kind(),
                    "External tool failed"
                );
            }
            _ => {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %error,
                    source = ?std::error::Error::source(&error),
                    error_kind = %error.kind(),
                    "Service operation failed"
                );
            }
        }

        let context = error.message().to_owned();

        match error.kind() {
            ServiceErrorKind::InvalidInput => ErrorKind::BadRequest
                .with_message(context.clone())
                .with_context(context),

            ServiceErrorKind::Conversion => ErrorKind::InternalServerError
                .with_message("Failed to convert document")
                .with_context(context),

            ServiceErrorKind::Render => ErrorKind::InternalServerError
                .with_message("Failed to render document")
                .with_context(context),

            ServiceErrorKind::FileSystem => ErrorKind::InternalServerError
                .with_message("File storage error")
                .with_context(context),

            ServiceErrorKind::Config | ServiceErrorKind::Internal => {
                ErrorKind::InternalServerError.with_context(context)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_keeps_the_message() {
        let error = HttpError::from(ServiceError::invalid_input("Unsupported image format"));

        assert_eq!(error.kind(), ErrorKind::BadRequest);
        assert_eq!(error.message(), Some("Unsupported image format"));
    }

    #[test]
    fn conversion_failures_are_internal() {
        let error = HttpError::from(ServiceError::conversion("soffice exited with status 1"));

        assert_eq!(error.kind(), ErrorKind::InternalServerError);
        assert_eq!(error.context(), Some("soffice exited with status 1"));
    }
}
