/// Configuration management for ripplefeed
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::env;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub feed: FeedConfig,
    pub worker: WorkerConfig,
}

/// Database configuration: one primary for writes, optional read replicas
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Primary connection URL, e.g. "postgresql://localhost:5432/ripplefeed"
    pub primary_url: String,

    /// Read replica URLs. Empty means reads go to the primary.
    pub replica_urls: Vec<String>,

    /// Maximum number of connections per pool
    pub max_connections: u32,

    /// Minimum number of connections per pool
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Redis connection URL
    pub redis_url: String,

    /// Key prefix for all cache entries
    pub key_prefix: String,

    /// Article detail / first-page TTL in seconds (default: 600 = 10 minutes)
    pub article_ttl: u64,

    /// Interaction counter hash TTL in seconds (default: 900 = 15 minutes)
    pub counter_ttl: u64,

    /// Follow data hash TTL in seconds (default: 900 = 15 minutes)
    pub follow_ttl: u64,
}

/// Feed fan-out configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Follower count above which a publish is written once to the pull log
    /// instead of being pushed into every follower's inbox
    pub fanout_threshold: i64,

    /// Upper bound on the follower list enumerated for push fan-out
    pub follower_cap: i64,

    /// Content size ceiling for opportunistic detail-cache warming, in bytes
    pub warm_content_max: usize,
}

/// Bounded cache-write worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Queue capacity; jobs submitted past this are dropped with a log line
    pub queue_capacity: usize,

    /// Number of worker tasks draining the queue
    pub workers: usize,

    /// Per-job timeout in seconds
    pub write_timeout: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            primary_url: "postgresql://localhost:5432/ripplefeed".to_string(),
            replica_urls: Vec::new(),
            max_connections: 20,
            min_connections: 2,
            acquire_timeout: 30,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "ripple:".to_string(),
            article_ttl: 600,
            counter_ttl: 900,
            follow_ttl: 900,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            fanout_threshold: 100,
            follower_cap: 100_000,
            warm_content_max: 1024 * 1024,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            workers: 4,
            write_timeout: 5,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            cache: CacheConfig::default(),
            feed: FeedConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> CoreResult<Self> {
        let defaults = Self::default();

        let replica_urls = env::var("DATABASE_REPLICA_URLS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let config = Self {
            database: DatabaseConfig {
                primary_url: env::var("DATABASE_URL")
                    .unwrap_or(defaults.database.primary_url),
                replica_urls,
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", defaults.database.max_connections),
                min_connections: env_or("DATABASE_MIN_CONNECTIONS", defaults.database.min_connections),
                acquire_timeout: env_or("DATABASE_ACQUIRE_TIMEOUT", defaults.database.acquire_timeout),
            },
            cache: CacheConfig {
                redis_url: env::var("REDIS_URL").unwrap_or(defaults.cache.redis_url),
                key_prefix: env::var("CACHE_KEY_PREFIX").unwrap_or(defaults.cache.key_prefix),
                article_ttl: env_or("CACHE_ARTICLE_TTL", defaults.cache.article_ttl),
                counter_ttl: env_or("CACHE_COUNTER_TTL", defaults.cache.counter_ttl),
                follow_ttl: env_or("CACHE_FOLLOW_TTL", defaults.cache.follow_ttl),
            },
            feed: FeedConfig {
                fanout_threshold: env_or("FEED_FANOUT_THRESHOLD", defaults.feed.fanout_threshold),
                follower_cap: env_or("FEED_FOLLOWER_CAP", defaults.feed.follower_cap),
                warm_content_max: env_or("FEED_WARM_CONTENT_MAX", defaults.feed.warm_content_max),
            },
            worker: WorkerConfig {
                queue_capacity: env_or("CACHE_WRITER_QUEUE", defaults.worker.queue_capacity),
                workers: env_or("CACHE_WRITER_WORKERS", defaults.worker.workers),
                write_timeout: env_or("CACHE_WRITER_TIMEOUT", defaults.worker.write_timeout),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> CoreResult<()> {
        if self.database.primary_url.is_empty() {
            return Err(CoreError::Config("DATABASE_URL must not be empty".into()));
        }
        if self.feed.fanout_threshold < 0 {
            return Err(CoreError::Config(
                "FEED_FANOUT_THRESHOLD must not be negative".into(),
            ));
        }
        if self.feed.follower_cap <= 0 {
            return Err(CoreError::Config("FEED_FOLLOWER_CAP must be positive".into()));
        }
        if self.worker.workers == 0 {
            return Err(CoreError::Config("CACHE_WRITER_WORKERS must be positive".into()));
        }
        if self.worker.queue_capacity == 0 {
            return Err(CoreError::Config("CACHE_WRITER_QUEUE must be positive".into()));
        }
        Ok(())
    }
}
