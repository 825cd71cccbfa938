use std::time::Duration;

/// Applied and pending migration versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Applied migration versions in chronological order
    pub applied_versions: Vec<String>,
    /// Embedded migration versions not yet applied
    pub pending_versions: Vec<String>,
}

impl MigrationStatus {
    /// Creates a new migration status.
    pub fn new(
        applied_versions: impl Into<Vec<String>>,
        pending_versions: impl Into<Vec<String>>,
    ) -> Self {
        Self {
            applied_versions: applied_versions.into(),
            pending_versions: pending_versions.into(),
        }
    }

    /// Returns the last applied migration version, if any.
    pub fn last_applied_version(&self) -> Option<&str> {
        self.applied_versions.last().map(String::as_str)
    }

    /// Returns the number of applied migrations.
    #[inline]
    pub fn applied_migrations(&self) -> usize {
        self.applied_versions.len()
    }

    /// Returns the number of pending migrations.
    #[inline]
    pub fn pending_migrations(&self) -> usize {
        self.pending_versions.len()
    }

    /// Returns true if all migrations have been applied.
    #[inline]
    pub fn is_up_to_date(&self) -> bool {
        self.pending_versions.is_empty()
    }
}

/// Outcome of a migration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationResult {
    /// Total duration of the migration run
    pub duration: Duration,
    /// Versions applied during this run
    pub processed_versions: Vec<String>,
}

impl MigrationResult {
    /// Creates a migration result.
    pub fn new(duration: Duration, processed_versions: Vec<String>) -> Self {
        Self {
            duration,
            processed_versions,
        }
    }

    /// Returns whether the run applied nothing.
    pub fn is_no_op(&self) -> bool {
        self.processed_versions.is_empty()
    }
}
