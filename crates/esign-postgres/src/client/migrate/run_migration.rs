use std::time::Instant;

use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_async::pooled_connection::PoolableConnection;
use diesel_migrations::MigrationHarness;
use tokio::task::spawn_blocking;

use super::{MigrationResult, get_migration_status};
use crate::{MIGRATIONS, PgClient, PgError, PgResult, TRACING_TARGET_MIGRATION};

/// Applies all pending embedded migrations.
///
/// Diesel's migration harness is synchronous, so the run happens on the
/// blocking thread pool through an [`AsyncConnectionWrapper`].
#[tracing::instrument(skip(pg), target = TRACING_TARGET_MIGRATION)]
pub async fn run_pending_migrations(pg: &PgClient) -> PgResult<MigrationResult> {
    let start_time = Instant::now();
    let mut conn = pg.get_pooled_connection().await?;

    let initial_status = get_migration_status(&mut conn).await?;
    if initial_status.is_up_to_date() {
        tracing::info!(
            target: TRACING_TARGET_MIGRATION,
            applied = initial_status.applied_migrations(),
            "Database schema is up to date"
        );
        return Ok(MigrationResult::new(start_time.elapsed(), vec![]));
    }

    tracing::info!(
        target: TRACING_TARGET_MIGRATION,
        pending = initial_status.pending_migrations(),
        "Applying pending migrations"
    );

    if conn.is_broken() {
        return Err(PgError::Migration(
            "Connection is broken before migrations".into(),
        ));
    }

    let mut wrapper: AsyncConnectionWrapper<_> = conn.into();
    let versions = spawn_blocking(move || {
        wrapper
            .run_pending_migrations(MIGRATIONS)
            .map(|versions| versions.iter().map(ToString::to_string).collect::<Vec<_>>())
    })
    .await
    .map_err(|err| {
        tracing::error!(target: TRACING_TARGET_MIGRATION, error = %err, "Migration task panicked");
        PgError::Migration(err.into())
    })?
    .map_err(|err| {
        tracing::error!(target: TRACING_TARGET_MIGRATION, error = %err, "Database migration failed");
        PgError::Migration(err)
    })?;

    let duration = start_time.elapsed();
    tracing::info!(
        target: TRACING_TARGET_MIGRATION,
        duration = ?duration,
        applied = versions.len(),
        "Database migrations applied"
    );

    Ok(MigrationResult::new(duration, versions))
}
