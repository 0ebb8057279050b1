/// Database layer: primary pool for writes, replica set for reads
use crate::config::DatabaseConfig;
use crate::error::{CoreError, CoreResult};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Create a PostgreSQL connection pool
pub async fn create_pool(config: &DatabaseConfig, url: &str) -> CoreResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout))
        .connect(url)
        .await
        .map_err(CoreError::Database)?;

    Ok(pool)
}

/// Read replica pools with a process-wide round-robin cursor.
///
/// The cursor replaces the original per-call reseeded random pick; all
/// replicas are assumed eventually consistent with the primary, so no
/// session affinity is needed.
pub struct ReplicaSet {
    pools: Vec<PgPool>,
    cursor: AtomicUsize,
}

impl ReplicaSet {
    pub fn new(pools: Vec<PgPool>) -> Self {
        debug_assert!(!pools.is_empty());
        Self {
            pools,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Pick the next replica pool
    pub fn replica(&self) -> &PgPool {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        &self.pools[i % self.pools.len()]
    }
}

/// Connect the primary and every configured replica.
///
/// With no replicas configured, reads fall back to the primary pool.
pub async fn connect(config: &DatabaseConfig) -> CoreResult<(PgPool, Arc<ReplicaSet>)> {
    info!("Connecting to PostgreSQL primary");
    let primary = create_pool(config, &config.primary_url).await?;

    let mut replicas = Vec::with_capacity(config.replica_urls.len());
    for url in &config.replica_urls {
        replicas.push(create_pool(config, url).await?);
    }
    if replicas.is_empty() {
        replicas.push(primary.clone());
    }
    info!(replicas = replicas.len(), "PostgreSQL connections established");

    Ok((primary, Arc::new(ReplicaSet::new(replicas))))
}

/// Test database connection
pub async fn test_connection(pool: &PgPool) -> CoreResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(CoreError::Database)?;

    Ok(())
}
