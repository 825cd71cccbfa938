use diesel::migration::MigrationSource;
use diesel::pg::Pg;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use super::MigrationStatus;
use crate::{MIGRATIONS, PgError, PgResult, TRACING_TARGET_MIGRATION};

/// Returns the versions of every migration embedded in the binary.
fn embedded_versions() -> PgResult<Vec<String>> {
    let migrations = MigrationSource::<Pg>::migrations(&MIGRATIONS).map_err(PgError::Migration)?;
    Ok(migrations
        .iter()
        .map(|migration| migration.name().version().to_string())
        .collect())
}

/// Gets the current migration status of the database.
#[tracing::instrument(skip(conn), target = TRACING_TARGET_MIGRATION)]
pub async fn get_migration_status(conn: &mut AsyncPgConnection) -> PgResult<MigrationStatus> {
    let applied_versions = get_applied_migrations(conn).await?;
    let pending_versions: Vec<String> = embedded_versions()?
        .into_iter()
        .filter(|version| !applied_versions.contains(version))
        .collect();

    let status = MigrationStatus::new(applied_versions, pending_versions);
    tracing::debug!(
        target: TRACING_TARGET_MIGRATION,
        applied = status.applied_migrations(),
        pending = status.pending_migrations(),
        "Migration status retrieved"
    );

    Ok(status)
}

/// Gets the applied migration versions recorded by Diesel.
///
/// A fresh database without the bookkeeping table has no applied migrations.
#[tracing::instrument(skip(conn), target = TRACING_TARGET_MIGRATION)]
pub async fn get_applied_migrations(conn: &mut AsyncPgConnection) -> PgResult<Vec<String>> {
    #[derive(diesel::QueryableByName)]
    struct MigrationVersion {
        #[diesel(sql_type = diesel::sql_types::Text)]
        version: String,
    }

    #[derive(diesel::QueryableByName)]
    struct TableExists {
        #[diesel(sql_type = diesel::sql_types::Bool)]
        exists: bool,
    }

    let table = diesel::sql_query(
        "SELECT to_regclass('__diesel_schema_migrations') IS NOT NULL AS exists",
    )
    .get_result::<TableExists>(conn)
    .await?;

    if !table.exists {
        return Ok(Vec::new());
    }

    let versions = diesel::sql_query(
        "SELECT version FROM __diesel_schema_migrations ORDER BY version",
    )
    .get_results::<MigrationVersion>(conn)
    .await?
    .into_iter()
    .map(|row| row.version)
    .collect();

    Ok(versions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_migration_is_embedded() -> anyhow::Result<()> {
        let versions = embedded_versions()?;
        assert!(versions.iter().any(|version| version == "20250101000000"));
        Ok(())
    }
}
