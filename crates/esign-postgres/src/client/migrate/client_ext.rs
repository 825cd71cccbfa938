use crate::{
    MigrationResult, MigrationStatus, PgClient, PgResult, get_migration_status,
    run_pending_migrations,
};

/// Extension trait adding migration management to [`PgClient`].
pub trait PgClientMigrationExt {
    /// Applies every embedded migration that has not been applied yet.
    ///
    /// Safe to call repeatedly: an up-to-date database is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails to apply or the database cannot
    /// be reached.
    fn run_pending_migrations(&self) -> impl Future<Output = PgResult<MigrationResult>> + Send;

    /// Compares the embedded migrations with the ones recorded in the database.
    fn get_migration_status(&self) -> impl Future<Output = PgResult<MigrationStatus>> + Send;
}

impl PgClientMigrationExt for PgClient {
    async fn run_pending_migrations(&self) -> PgResult<MigrationResult> {
        run_pending_migrations(self).await
    }

    async fn get_migration_status(&self) -> PgResult<MigrationStatus> {
        let mut conn = self.get_pooled_connection().await?;
        get_migration_status(&mut conn).await
    }
}
