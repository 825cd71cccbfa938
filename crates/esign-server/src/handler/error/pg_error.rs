//! Database error to HTTP error conversion.
//!
//! Constraint violations on the `documents` table are reported as client
//! errors; every other database failure becomes a 500 with the cause logged.

use esign_postgres::PgError;
use esign_postgres::types::{ConstraintViolation, DocumentConstraints};

use crate::handler::{Error, ErrorKind};

/// Tracing target for database error conversions.
const TRACING_TARGET: &str = "esign_server::handler::postgres";

impl From<DocumentConstraints> for Error<'static> {
    fn from(constraint: DocumentConstraints) -> Self {
        let error = match constraint {
            DocumentConstraints::DocIdFormat => ErrorKind::BadRequest
                .with_message("Invalid document identifier")
                .with_suggestion("Document identifiers have the form DOC-<uuid>"),
            DocumentConstraints::NameLength => ErrorKind::BadRequest
                .with_message("Document name must be between 1 and 255 characters long"),
            DocumentConstraints::DocumentPathFormat => {
                ErrorKind::InternalServerError.with_message("Invalid stored document path")
            }
            DocumentConstraints::SignatureConsistency => ErrorKind::BadRequest
                .with_message("Invalid signature format or type"),
            DocumentConstraints::UpdatedAfterCreated => ErrorKind::InternalServerError
                .with_message("Document timestamps are out of order"),
            DocumentConstraints::PrimaryKey => {
                ErrorKind::Conflict.with_message("Document already exists")
            }
        };

        error.with_resource("document")
    }
}

impl From<ConstraintViolation> for Error<'static> {
    fn from(constraint: ConstraintViolation) -> Self {
        match constraint {
            ConstraintViolation::Documents(c) => c.into(),
        }
    }
}

impl From<PgError> for Error<'static> {
    fn from(error: PgError) -> Self {
        match &error {
            PgError::Config(config_error) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %config_error,
                    "database configuration error"
                );
            }
            PgError::Timeout(timeout) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    timeout = ?timeout,
                    "database timeout",
                );
            }
            PgError::Connection(connection_error) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %connection_error,
                    "database connection error"
                );
            }
            PgError::Migration(migration_error) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %migration_error,
                    "database migration error"
                );
            }
            PgError::Query(query_error) => {
                if let Some(constraint) = error.constraint_violation() {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        constraint = %constraint,
                        error = %query_error,
                        "query error (constraint violation)"
                    );
                    return constraint.into();
                }

                tracing::error!(
                    target: TRACING_TARGET,
                    error = %query_error,
                    "query error"
                );
            }
            PgError::Unexpected(unexpected_error) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %unexpected_error,
                    "unexpected database error"
                );
            }
        }

        if error.is_transient() {
            return ErrorKind::InternalServerError
                .with_message("Database temporarily unavailable")
                .with_context(error.to_string());
        }

        ErrorKind::InternalServerError.with_context(error.to_string())
    }
}
