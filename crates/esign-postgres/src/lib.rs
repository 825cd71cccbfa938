#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Embeds all migrations into the final binary.
pub(crate) const MIGRATIONS: diesel_migrations::EmbeddedMigrations =
    diesel_migrations::embed_migrations!("./src/migrations");

// Tracing target constants for consistent logging.

/// Tracing target for client-related operations.
///
/// Use this target for logging client initialization, configuration, and lifecycle events.
pub const TRACING_TARGET_CLIENT: &str = "esign_postgres::client";

/// Tracing target for database query operations.
pub const TRACING_TARGET_QUERY: &str = "esign_postgres::query";

/// Tracing target for database migration operations.
///
/// Use this target for logging migration application and migration status checks.
pub const TRACING_TARGET_MIGRATION: &str = "esign_postgres::migrations";

/// Tracing target for database connection operations.
///
/// Use this target for logging connection establishment, pool management, and connection errors.
pub const TRACING_TARGET_CONNECTION: &str = "esign_postgres::connection";

mod client;
pub mod model;
pub mod query;
mod schema;
pub mod types;

use std::borrow::Cow;

use deadpool::managed::TimeoutType;
use diesel::ConnectionError;
use diesel::result::Error;
pub use diesel_async::AsyncPgConnection as PgConnection;

pub use crate::client::{
    ConnectionPool, MigrationResult, MigrationStatus, PgClient, PgClientMigrationExt, PgConfig,
    PgConn, PgPoolStatus, PooledConnection, get_applied_migrations, get_migration_status,
    run_pending_migrations,
};
use crate::types::ConstraintViolation;

pub mod error {
    //! Error types and utilities for database operations.
    //!
    //! See [`PgError`] for the main error type used throughout this crate.
    //!
    //! [`PgError`]: crate::PgError

    /// Type-erased error type for dynamic error handling.
    pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

    use std::borrow::Cow;

    pub use deadpool::managed::TimeoutType;
    pub use diesel::result::{ConnectionError as DieselConnectionError, Error as DieselError};
    pub use diesel_async::pooled_connection::PoolError as DieselPoolError;
    pub use diesel_async::pooled_connection::deadpool::PoolError as DeadpoolError;

    /// Provides contextual hints for error types to aid in debugging and user messaging.
    pub trait ErrorHint {
        /// Returns an additional hint for an error type.
        ///
        /// The hint should provide actionable information about the error context
        /// or potential solutions.
        fn hint(&self) -> Cow<'static, str>;
    }

    impl ErrorHint for TimeoutType {
        fn hint(&self) -> Cow<'static, str> {
            match self {
                TimeoutType::Wait => Cow::Borrowed(
                    "Connection pool is exhausted, consider increasing the pool size",
                ),
                TimeoutType::Create => Cow::Borrowed(
                    "Unable to establish a new database connection, check the connection string and database availability",
                ),
                TimeoutType::Recycle => Cow::Borrowed(
                    "Failed to recycle a database connection, it may be in an invalid state",
                ),
            }
        }
    }
}

/// Error type for all PostgreSQL database operations.
#[derive(Debug, thiserror::Error)]
#[must_use = "database errors should be handled appropriately"]
pub enum PgError {
    /// Invalid or missing database configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database operation timed out.
    ///
    /// This can occur during connection creation, waiting for available connections,
    /// or connection recycling operations.
    #[error("Database operation timed out")]
    Timeout(TimeoutType),

    /// Failed to establish or maintain a database connection.
    #[error("Database connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Applying embedded migrations failed.
    #[error("Database migration error: {0}")]
    Migration(error::BoxError),

    /// Database query execution failed.
    ///
    /// This includes constraint violations, type mismatches,
    /// and other query-related failures.
    #[error("Database query error: {0}")]
    Query(#[from] Error),

    /// Unexpected error occurred.
    #[error("Unexpected error: {0}")]
    Unexpected(Cow<'static, str>),
}

impl PgError {
    /// Extracts the constraint name from a constraint violation error.
    ///
    /// # Returns
    ///
    /// - `Some(constraint_name)` if this error represents a constraint violation
    /// - `None` if this error is not related to a constraint violation
    pub fn constraint(&self) -> Option<&str> {
        let PgError::Query(err) = self else {
            return None;
        };

        let Error::DatabaseError(_, err) = err else {
            return None;
        };

        err.constraint_name()
    }

    /// Returns a structured constraint violation if this error represents one.
    pub fn constraint_violation(&self) -> Option<ConstraintViolation> {
        self.constraint().and_then(ConstraintViolation::new)
    }

    /// Returns whether this error indicates a transient failure that might succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PgError::Timeout(_) | PgError::Connection(ConnectionError::BadConnection(_))
        )
    }
}

impl From<error::DeadpoolError> for PgError {
    fn from(value: error::DeadpoolError) -> Self {
        use error::{DeadpoolError, DieselPoolError};

        match value {
            DeadpoolError::Timeout(timeout) => Self::Timeout(timeout),
            DeadpoolError::Backend(DieselPoolError::QueryError(error)) => Self::Query(error),
            DeadpoolError::Backend(DieselPoolError::ConnectionError(error)) => {
                Self::Connection(error)
            }
            DeadpoolError::PostCreateHook(err) => {
                tracing::warn!(target: TRACING_TARGET_CONNECTION, error = %err, "Post-create hook rejected a connection");
                Self::Unexpected(err.to_string().into())
            }
            DeadpoolError::NoRuntimeSpecified => {
                tracing::error!(target: TRACING_TARGET_CONNECTION, "No tokio runtime specified for connection pool");
                Self::Unexpected("No runtime specified".into())
            }
            DeadpoolError::Closed => Self::Connection(ConnectionError::InvalidConnectionUrl(
                "Connection pool is closed".into(),
            )),
        }
    }
}

/// Specialized [`Result`] type for database operations.
pub type PgResult<T, E = PgError> = Result<T, E>;

#[cfg(test)]
mod tests {
    use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind};

    use super::*;
    use crate::types::DocumentConstraints;

    struct CheckViolation(&'static str);

    impl DatabaseErrorInformation for CheckViolation {
        fn message(&self) -> &str {
            "new row violates check constraint"
        }

        fn details(&self) -> Option<&str> {
            None
        }

        fn hint(&self) -> Option<&str> {
            None
        }

        fn table_name(&self) -> Option<&str> {
            Some("documents")
        }

        fn column_name(&self) -> Option<&str> {
            None
        }

        fn constraint_name(&self) -> Option<&str> {
            Some(self.0)
        }

        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    fn check_violation(name: &'static str) -> PgError {
        PgError::Query(Error::DatabaseError(
            DatabaseErrorKind::CheckViolation,
            Box::new(CheckViolation(name)),
        ))
    }

    #[test]
    fn constraint_name_is_extracted() {
        let error = check_violation("documents_signature_consistency");
        assert_eq!(error.constraint(), Some("documents_signature_consistency"));
        assert_eq!(
            error.constraint_violation(),
            Some(ConstraintViolation::Documents(
                DocumentConstraints::SignatureConsistency
            ))
        );
    }

    #[test]
    fn non_query_errors_have_no_constraint() {
        let error = PgError::Config("missing url".into());
        assert_eq!(error.constraint(), None);
        assert_eq!(error.constraint_violation(), None);
        assert!(!error.is_transient());
    }

    #[test]
    fn timeouts_are_transient() {
        assert!(PgError::Timeout(TimeoutType::Wait).is_transient());
    }
}
