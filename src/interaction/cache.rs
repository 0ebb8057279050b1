/// Engagement counter cache: one Redis hash per (biz, biz_id)
///
/// Increments run server-side through a Lua script so the field update and
/// TTL refresh are atomic, and only hashes a full populate has written are
/// touched. Membership flags are never cached.
use crate::cache::{build_key, incr_field_script};
use crate::config::CacheConfig;
use crate::domain::Counters;
use crate::error::CoreResult;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;

const FIELD_READ: &str = "read_cnt";
const FIELD_LIKE: &str = "like_cnt";
const FIELD_COLLECT: &str = "collect_cnt";

#[async_trait]
pub trait CounterCache: Send + Sync {
    async fn incr_read(&self, biz: &str, biz_id: i64) -> CoreResult<()>;

    /// delta is +1 or -1
    async fn incr_like(&self, biz: &str, biz_id: i64, delta: i64) -> CoreResult<()>;

    async fn incr_collect(&self, biz: &str, biz_id: i64, delta: i64) -> CoreResult<()>;

    /// None on hash miss
    async fn counters(&self, biz: &str, biz_id: i64) -> CoreResult<Option<Counters>>;

    async fn set_counters(&self, biz: &str, biz_id: i64, counters: &Counters) -> CoreResult<()>;
}

pub struct RedisCounterCache {
    conn: ConnectionManager,
    prefix: String,
    ttl: i64,
    script: redis::Script,
}

impl RedisCounterCache {
    pub fn new(conn: ConnectionManager, config: &CacheConfig) -> Self {
        Self {
            conn,
            prefix: config.key_prefix.clone(),
            ttl: config.counter_ttl as i64,
            script: incr_field_script(),
        }
    }

    fn key(&self, biz: &str, biz_id: i64) -> String {
        build_key(&self.prefix, &["interaction", biz, &biz_id.to_string()])
    }

    async fn incr_field(&self, biz: &str, biz_id: i64, field: &str, delta: i64) -> CoreResult<()> {
        let key = self.key(biz, biz_id);
        let mut conn = self.conn.clone();
        let _: i64 = self
            .script
            .key(&key)
            .arg(field)
            .arg(delta)
            .arg(self.ttl)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CounterCache for RedisCounterCache {
    async fn incr_read(&self, biz: &str, biz_id: i64) -> CoreResult<()> {
        self.incr_field(biz, biz_id, FIELD_READ, 1).await
    }

    async fn incr_like(&self, biz: &str, biz_id: i64, delta: i64) -> CoreResult<()> {
        self.incr_field(biz, biz_id, FIELD_LIKE, delta).await
    }

    async fn incr_collect(&self, biz: &str, biz_id: i64, delta: i64) -> CoreResult<()> {
        self.incr_field(biz, biz_id, FIELD_COLLECT, delta).await
    }

    async fn counters(&self, biz: &str, biz_id: i64) -> CoreResult<Option<Counters>> {
        let key = self.key(biz, biz_id);
        let mut conn = self.conn.clone();
        let map: HashMap<String, String> = conn.hgetall(&key).await?;

        if map.is_empty() {
            return Ok(None);
        }

        let field = |name: &str| {
            map.get(name)
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(0)
        };
        Ok(Some(Counters {
            read_cnt: field(FIELD_READ),
            like_cnt: field(FIELD_LIKE),
            collect_cnt: field(FIELD_COLLECT),
        }))
    }

    async fn set_counters(&self, biz: &str, biz_id: i64, counters: &Counters) -> CoreResult<()> {
        let key = self.key(biz, biz_id);
        let mut conn = self.conn.clone();
        let _: () = conn
            .hset_multiple(
                &key,
                &[
                    (FIELD_READ, counters.read_cnt),
                    (FIELD_LIKE, counters.like_cnt),
                    (FIELD_COLLECT, counters.collect_cnt),
                ],
            )
            .await?;
        let _: () = conn.expire(&key, self.ttl).await?;
        Ok(())
    }
}
