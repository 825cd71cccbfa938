//! Connection setup callback and pool lifecycle hooks for [`diesel`] and [`deadpool`].

use std::time::Instant;

use deadpool::managed::{HookResult, Metrics};
use diesel::ConnectionResult;
use diesel_async::pooled_connection::{PoolError, PoolableConnection};
use diesel_async::{AsyncConnection, AsyncPgConnection};
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::{PgConfig, TRACING_TARGET_CONNECTION};

/// Establishes a new connection, logging the masked address and the time it took.
///
/// Installed as the [`ManagerConfig::custom_setup`] callback.
///
/// [`ManagerConfig::custom_setup`]: diesel_async::pooled_connection::ManagerConfig
pub fn setup_callback<C>(addr: &str) -> BoxFuture<'_, ConnectionResult<C>>
where
    C: AsyncConnection + 'static,
{
    let start = Instant::now();
    let masked_addr = PgConfig::mask_url(addr);

    async move {
        let result = C::establish(addr).await;
        let elapsed_ms = start.elapsed().as_millis();

        match &result {
            Ok(_) => tracing::info!(
                target: TRACING_TARGET_CONNECTION,
                addr = %masked_addr,
                elapsed_ms,
                "Database connection established"
            ),
            Err(err) => tracing::error!(
                target: TRACING_TARGET_CONNECTION,
                addr = %masked_addr,
                elapsed_ms,
                error = %err,
                "Failed to establish database connection"
            ),
        }

        result
    }
    .boxed()
}

/// Logs the state of a connection at a pool lifecycle point.
///
/// Returns `true` if the connection is broken.
fn inspect(hook: &'static str, conn: &mut AsyncPgConnection, metrics: &Metrics) -> bool {
    let is_broken = conn.is_broken();

    tracing::trace!(
        target: TRACING_TARGET_CONNECTION,
        hook,
        is_broken,
        age = ?metrics.age(),
        recycle_count = metrics.recycle_count,
        "Pool hook invoked"
    );

    if is_broken {
        tracing::warn!(
            target: TRACING_TARGET_CONNECTION,
            hook,
            recycle_count = metrics.recycle_count,
            "Pooled connection is broken"
        );
    }

    is_broken
}

/// Called after a new connection has been added to the pool.
pub fn post_create(conn: &mut AsyncPgConnection, metrics: &Metrics) -> HookResult<PoolError> {
    inspect("post_create", conn, metrics);
    Ok(())
}

/// Called before a connection is recycled back into the pool.
pub fn pre_recycle(conn: &mut AsyncPgConnection, metrics: &Metrics) -> HookResult<PoolError> {
    inspect("pre_recycle", conn, metrics);
    Ok(())
}

/// Called after a connection has been recycled.
pub fn post_recycle(conn: &mut AsyncPgConnection, metrics: &Metrics) -> HookResult<PoolError> {
    inspect("post_recycle", conn, metrics);
    Ok(())
}
