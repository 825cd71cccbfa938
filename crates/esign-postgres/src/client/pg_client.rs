use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use deadpool::managed::{Hook, Pool};
use derive_more::{Deref, DerefMut};
use diesel_async::pooled_connection::{AsyncDieselConnectionManager, ManagerConfig};

use super::custom_hooks;
use crate::{
    ConnectionPool, PgConfig, PgError, PgResult, PooledConnection, TRACING_TARGET_CLIENT,
    TRACING_TARGET_CONNECTION,
};

/// Connections slower than this to acquire are reported as a warning.
const SLOW_ACQUIRE_THRESHOLD: Duration = Duration::from_millis(100);

/// Connection pool status information.
#[derive(Debug, Clone)]
pub struct PgPoolStatus {
    /// Maximum number of connections in the pool
    pub max_size: usize,
    /// Current number of connections in the pool
    pub size: usize,
    /// Number of available connections
    pub available: usize,
    /// Number of requests waiting for connections
    pub waiting: usize,
}

impl PgPoolStatus {
    /// Returns the utilization of the pool (0.0 to 1.0).
    #[inline]
    pub fn utilization(&self) -> f64 {
        if self.max_size == 0 {
            return 0.0;
        }

        self.size.saturating_sub(self.available) as f64 / self.max_size as f64
    }
}

/// Database client for the document store.
///
/// Cloning is cheap: all clones share the same connection pool.
#[derive(Clone)]
pub struct PgClient {
    inner: Arc<PgClientInner>,
}

struct PgClientInner {
    pool: ConnectionPool,
    config: PgConfig,
}

impl PgClient {
    /// Creates a new database client with the provided configuration.
    ///
    /// The pool is created lazily: no connection is opened until the first
    /// call to [`PgClient::get_connection`].
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be built from the configuration.
    #[tracing::instrument(
        skip(config),
        target = TRACING_TARGET_CLIENT,
        fields(database_url = %config.database_url_masked())
    )]
    pub fn new(config: PgConfig) -> PgResult<Self> {
        let mut manager_config = ManagerConfig::default();
        manager_config.custom_setup = Box::new(custom_hooks::setup_callback);
        let manager =
            AsyncDieselConnectionManager::new_with_config(config.database_url(), manager_config);

        let pool = Pool::builder(manager)
            .max_size(config.postgres_max_connections as usize)
            .wait_timeout(config.connection_timeout())
            .create_timeout(config.connection_timeout())
            .recycle_timeout(config.idle_timeout())
            .runtime(deadpool::Runtime::Tokio1)
            .post_create(Hook::sync_fn(custom_hooks::post_create))
            .pre_recycle(Hook::sync_fn(custom_hooks::pre_recycle))
            .post_recycle(Hook::sync_fn(custom_hooks::post_recycle))
            .build()
            .map_err(|e| {
                tracing::error!(target: TRACING_TARGET_CLIENT, error = %e, "Failed to create connection pool");
                PgError::Unexpected(format!("Failed to build connection pool: {}", e).into())
            })?;

        tracing::info!(
            target: TRACING_TARGET_CLIENT,
            max_connections = config.postgres_max_connections,
            "Database client initialized"
        );

        Ok(Self {
            inner: Arc::new(PgClientInner { pool, config }),
        })
    }

    /// Gets a connection from the pool.
    ///
    /// Returns a [`PgConn`] wrapper that implements the repository traits.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection is available within the timeout period
    /// or a new connection cannot be established.
    pub async fn get_connection(&self) -> PgResult<PgConn> {
        let conn = self.get_pooled_connection().await?;
        Ok(PgConn::new(conn))
    }

    /// Gets a raw pooled connection from the pool.
    pub(crate) async fn get_pooled_connection(&self) -> PgResult<PooledConnection> {
        let start = Instant::now();
        let conn = self.inner.pool.get().await.map_err(|e| {
            tracing::error!(
                target: TRACING_TARGET_CONNECTION,
                error = %e,
                elapsed = ?start.elapsed(),
                "Failed to acquire connection from pool"
            );
            PgError::from(e)
        })?;

        let elapsed = start.elapsed();
        if elapsed > SLOW_ACQUIRE_THRESHOLD {
            tracing::warn!(
                target: TRACING_TARGET_CONNECTION,
                elapsed = ?elapsed,
                "Connection acquisition took longer than expected"
            );
        }

        Ok(conn)
    }

    /// Gets the current pool status and statistics.
    #[inline]
    pub fn pool_status(&self) -> PgPoolStatus {
        let status = self.inner.pool.status();
        PgPoolStatus {
            max_size: status.max_size,
            size: status.size,
            available: status.available,
            waiting: status.waiting,
        }
    }

    /// Gets the database configuration used by this client.
    #[inline]
    pub fn config(&self) -> &PgConfig {
        &self.inner.config
    }
}

impl fmt::Debug for PgClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pool_status = self.pool_status();
        f.debug_struct("PgClient")
            .field("database_url", &self.inner.config.database_url_masked())
            .field("pool_max_size", &pool_status.max_size)
            .field("pool_size", &pool_status.size)
            .field("pool_available", &pool_status.available)
            .finish()
    }
}

/// A pooled database connection.
///
/// `PgConn` dereferences to the underlying [`AsyncPgConnection`], so the
/// repository traits such as [`DocumentRepository`] can be called on it
/// directly. The connection returns to the pool when dropped.
///
/// ```ignore
/// let mut conn = pg_client.get_connection().await?;
/// let document = conn.find_document_by_id(doc_id).await?;
/// ```
///
/// [`AsyncPgConnection`]: crate::PgConnection
/// [`DocumentRepository`]: crate::query::DocumentRepository
#[derive(Deref, DerefMut)]
pub struct PgConn {
    #[deref]
    #[deref_mut]
    conn: PooledConnection,
}

impl PgConn {
    /// Creates a new connection wrapper from a pooled connection.
    pub fn new(conn: PooledConnection) -> Self {
        Self { conn }
    }
}

impl fmt::Debug for PgConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgConn").finish_non_exhaustive()
    }
}
