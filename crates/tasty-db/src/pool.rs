//! Connection pool setup.
//!
//! Every open transaction pins one pooled connection until it commits or
//! rolls back, so `max_connections` bounds how many units of work run at once
//! and `acquire_timeout` bounds how long `begin` waits for a free slot.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use tasty_core::{logging, Error, Result};

/// Pool sizing used when the caller does not override it.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    /// How long `begin` waits for a connection before failing.
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }
}

/// Connect with the default [`PoolConfig`].
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    create_pool_with_config(database_url, PoolConfig::default()).await
}

/// Connect to `database_url`. A malformed URL is a configuration error.
pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    let connect_options: PgConnectOptions = database_url
        .parse()
        .map_err(|e: sqlx::Error| Error::Config(format!("Invalid database URL: {}", e)))?;
    create_pool_with_connect_options(connect_options, config).await
}

/// Connect with explicit options, e.g. a `search_path` scoped to one schema.
pub async fn create_pool_with_connect_options(
    connect_options: PgConnectOptions,
    config: PoolConfig,
) -> Result<PgPool> {
    let start = Instant::now();

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .connect_with(connect_options)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = logging::DATABASE,
        component = logging::POOL,
        op = "connect",
        max_connections = config.max_connections,
        acquire_timeout_secs = config.acquire_timeout.as_secs(),
        pool_size = pool.size(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database pool ready"
    );
    Ok(pool)
}

/// Log a snapshot of pool usage. Warns when no connection is idle, since the
/// next `begin` will have to wait.
pub fn log_pool_metrics(pool: &PgPool) {
    let size = pool.size();
    let idle = pool.num_idle();

    debug!(
        subsystem = logging::DATABASE,
        component = logging::POOL,
        op = "metrics",
        pool_size = size,
        pool_idle = idle,
        "Pool usage"
    );

    if idle == 0 && size > 0 {
        warn!(
            subsystem = logging::DATABASE,
            component = logging::POOL,
            pool_size = size,
            "No idle connections left in the pool"
        );
    }
}
