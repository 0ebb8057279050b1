/// Follow graph: relations, aggregate counts, and the count cache consumed
/// by the fan-out dispatcher and the feed aggregator
pub mod cache;
pub mod store;

pub use cache::{FollowCache, RedisFollowCache};
pub use store::{FollowStore, PgFollowStore};

use crate::domain::{FollowData, FollowRelation};
use crate::error::CoreResult;
use crate::tasks::CacheWriter;
use std::sync::Arc;
use tracing::warn;

pub struct FollowRepository {
    store: Arc<dyn FollowStore>,
    cache: Arc<dyn FollowCache>,
    writer: CacheWriter,
}

impl FollowRepository {
    pub fn new(
        store: Arc<dyn FollowStore>,
        cache: Arc<dyn FollowCache>,
        writer: CacheWriter,
    ) -> Self {
        Self {
            store,
            cache,
            writer,
        }
    }

    pub async fn follow(&self, follower: i64, followee: i64) -> CoreResult<()> {
        self.store.insert_follow(follower, followee).await
    }

    pub async fn unfollow(&self, follower: i64, followee: i64) -> CoreResult<()> {
        self.store.deactivate_follow(follower, followee).await
    }

    pub async fn is_followed(&self, follower: i64, followee: i64) -> CoreResult<bool> {
        self.store.get_followed(follower, followee).await
    }

    /// Aggregate counts, cache-aside. Counts mutated by follow/unfollow are
    /// not invalidated here; they converge within the cache TTL.
    pub async fn follow_data(&self, uid: i64) -> CoreResult<FollowData> {
        match self.cache.follow_data(uid).await {
            Ok(Some(data)) => return Ok(data),
            Ok(None) => {}
            Err(e) => warn!(uid, "follow data cache read failed: {e}"),
        }

        let data = self.store.follow_data(uid).await?;

        let cache = Arc::clone(&self.cache);
        self.writer.submit("follow data warm", async move {
            cache.set_follow_data(&data).await
        });

        Ok(data)
    }

    pub async fn followee_list(
        &self,
        follower: i64,
        limit: i64,
        offset: i64,
    ) -> CoreResult<Vec<FollowRelation>> {
        self.store.followee_list(follower, limit, offset).await
    }

    pub async fn follower_list(
        &self,
        followee: i64,
        limit: i64,
        offset: i64,
    ) -> CoreResult<Vec<FollowRelation>> {
        self.store.follower_list(followee, limit, offset).await
    }
}
