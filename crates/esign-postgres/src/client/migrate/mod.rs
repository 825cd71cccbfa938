//! Embedded database migrations.
//!
//! Migrations under `src/migrations` are compiled into the binary and applied
//! through [`PgClientMigrationExt::run_pending_migrations`] at startup.

mod client_ext;
mod migrate_result;
mod run_migration;
mod status;

pub use client_ext::PgClientMigrationExt;
pub use migrate_result::{MigrationResult, MigrationStatus};
pub use run_migration::run_pending_migrations;
pub use status::{get_applied_migrations, get_migration_status};
