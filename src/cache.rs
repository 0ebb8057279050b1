/// Redis plumbing shared by the per-subsystem caches
///
/// Each subsystem owns its own key namespace and cache type; this module
/// provides the connection, the key-prefix convention, and the server-side
/// hash-increment script.
use crate::config::CacheConfig;
use crate::error::CoreResult;
use redis::aio::ConnectionManager;
use redis::Client;
use tracing::info;

/// Atomic hash-field increment, guarded by key existence.
///
/// Incrementing a field on an absent hash would leave the other counter
/// fields missing and serve partial counts on the next read, so the script
/// only touches hashes a full populate has already written. The TTL is
/// refreshed on every successful write.
///
/// KEYS[1] = hash key, ARGV[1] = field, ARGV[2] = delta, ARGV[3] = ttl secs
const INCR_FIELD_LUA: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    redis.call('HINCRBY', KEYS[1], ARGV[1], ARGV[2])
    redis.call('EXPIRE', KEYS[1], ARGV[3])
    return 1
end
return 0
"#;

/// Build the shared increment script
pub fn incr_field_script() -> redis::Script {
    redis::Script::new(INCR_FIELD_LUA)
}

/// Connect to Redis
pub async fn connect(config: &CacheConfig) -> CoreResult<ConnectionManager> {
    info!("Connecting to Redis at {}", config.redis_url);

    let client = Client::open(config.redis_url.as_str())?;
    let connection = ConnectionManager::new(client).await?;

    info!("Redis connection established");
    Ok(connection)
}

/// Build a cache key under the configured prefix
pub fn build_key(prefix: &str, parts: &[&str]) -> String {
    let mut key = String::from(prefix);
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            key.push(':');
        }
        key.push_str(part);
    }
    key
}
