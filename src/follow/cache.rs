/// Follow count cache: one Redis hash per user, advisory within its TTL
use crate::cache::build_key;
use crate::config::CacheConfig;
use crate::domain::FollowData;
use crate::error::CoreResult;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;

const FIELD_FOLLOWERS: &str = "follower_cnt";
const FIELD_FOLLOWEES: &str = "followee_cnt";

#[async_trait]
pub trait FollowCache: Send + Sync {
    /// None on miss; absence never implies a user has no followers
    async fn follow_data(&self, uid: i64) -> CoreResult<Option<FollowData>>;

    async fn set_follow_data(&self, data: &FollowData) -> CoreResult<()>;
}

pub struct RedisFollowCache {
    conn: ConnectionManager,
    prefix: String,
    ttl: i64,
}

impl RedisFollowCache {
    pub fn new(conn: ConnectionManager, config: &CacheConfig) -> Self {
        Self {
            conn,
            prefix: config.key_prefix.clone(),
            ttl: config.follow_ttl as i64,
        }
    }

    fn key(&self, uid: i64) -> String {
        build_key(&self.prefix, &["follow", "data", &uid.to_string()])
    }
}

#[async_trait]
impl FollowCache for RedisFollowCache {
    async fn follow_data(&self, uid: i64) -> CoreResult<Option<FollowData>> {
        let key = self.key(uid);
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
        Ok(Some(FollowData {
            uid,
            followers: field(FIELD_FOLLOWERS),
            followees: field(FIELD_FOLLOWEES),
        }))
    }

    async fn set_follow_data(&self, data: &FollowData) -> CoreResult<()> {
        let key = self.key(data.uid);
        let mut conn = self.conn.clone();
        let _: () = conn
            .hset_multiple(
                &key,
                &[
                    (FIELD_FOLLOWERS, data.followers),
                    (FIELD_FOLLOWEES, data.followees),
                ],
            )
            .await?;
        let _: () = conn.expire(&key, self.ttl).await?;
        Ok(())
    }
}
