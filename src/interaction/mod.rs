/// Interaction counter subsystem: reads, likes, and collects
///
/// Mutations persist first, then apply the matching cache increment; cache
/// errors on that path propagate. Reads are cache-aside for the counters
/// while membership flags always come from the store.
pub mod cache;
pub mod store;

pub use cache::{CounterCache, RedisCounterCache};
pub use store::{CounterStore, PgCounterStore};

use crate::domain::InteractionSummary;
use crate::error::CoreResult;
use crate::tasks::CacheWriter;
use std::sync::Arc;
use tracing::warn;

pub struct InteractionService {
    store: Arc<dyn CounterStore>,
    cache: Arc<dyn CounterCache>,
    writer: CacheWriter,
}

impl InteractionService {
    pub fn new(
        store: Arc<dyn CounterStore>,
        cache: Arc<dyn CounterCache>,
        writer: CacheWriter,
    ) -> Self {
        Self {
            store,
            cache,
            writer,
        }
    }

    pub async fn incr_read(&self, biz: &str, biz_id: i64) -> CoreResult<()> {
        self.store.incr_read(biz, biz_id).await?;
        self.cache.incr_read(biz, biz_id).await
    }

    /// Idempotent: only the Inactive -> Active transition moves the counter,
    /// in store and cache alike.
    pub async fn like(&self, biz: &str, biz_id: i64, uid: i64) -> CoreResult<()> {
        if self.store.activate_like(biz, biz_id, uid).await? {
            self.cache.incr_like(biz, biz_id, 1).await?;
        }
        Ok(())
    }

    pub async fn cancel_like(&self, biz: &str, biz_id: i64, uid: i64) -> CoreResult<()> {
        if self.store.deactivate_like(biz, biz_id, uid).await? {
            self.cache.incr_like(biz, biz_id, -1).await?;
        }
        Ok(())
    }

    pub async fn collect(&self, biz: &str, biz_id: i64, uid: i64) -> CoreResult<()> {
        if self.store.activate_collect(biz, biz_id, uid).await? {
            self.cache.incr_collect(biz, biz_id, 1).await?;
        }
        Ok(())
    }

    pub async fn cancel_collect(&self, biz: &str, biz_id: i64, uid: i64) -> CoreResult<()> {
        if self.store.deactivate_collect(biz, biz_id, uid).await? {
            self.cache.incr_collect(biz, biz_id, -1).await?;
        }
        Ok(())
    }

    /// Counters plus the caller's membership flags.
    ///
    /// Counters are cache-aside with an async warm on miss; the flags are
    /// fetched from the store concurrently, and the first error wins.
    pub async fn get(&self, biz: &str, biz_id: i64, uid: i64) -> CoreResult<InteractionSummary> {
        let counters = match self.cache.counters(biz, biz_id).await {
            Ok(Some(counters)) => counters,
            Ok(None) => self.load_and_warm(biz, biz_id).await?,
            Err(e) => {
                warn!(biz, biz_id, "counter cache read failed: {e}");
                self.load_and_warm(biz, biz_id).await?
            }
        };

        let (liked, collected) = tokio::join!(
            self.store.is_liked(biz, biz_id, uid),
            self.store.is_collected(biz, biz_id, uid),
        );

        Ok(InteractionSummary {
            counters,
            is_liked: liked?,
            is_collected: collected?,
        })
    }

    pub async fn collection_list(&self, biz: &str, uid: i64) -> CoreResult<Vec<i64>> {
        self.store.collection_list(biz, uid).await
    }

    async fn load_and_warm(&self, biz: &str, biz_id: i64) -> CoreResult<crate::domain::Counters> {
        let counters = self.store.counters(biz, biz_id).await?;

        let cache = Arc::clone(&self.cache);
        let biz = biz.to_string();
        self.writer.submit("interaction counters warm", async move {
            cache.set_counters(&biz, biz_id, &counters).await
        });

        Ok(counters)
    }
}
