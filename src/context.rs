/// Application context and dependency wiring
use crate::{
    article::{ArticleRepository, ArticleService, PgArticleStore, RedisArticleCache},
    cache,
    config::ServerConfig,
    db,
    error::CoreResult,
    feed::{FanoutDispatcher, FeedAggregator, FeedStore, PgFeedStore, PublishIntake},
    follow::{FollowRepository, PgFollowStore, RedisFollowCache},
    interaction::{InteractionService, PgCounterStore, RedisCounterCache},
    tasks::{CacheWriter, CacheWriterHandle},
};
use std::sync::Arc;

/// Shared services behind the content distribution core
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub follows: Arc<FollowRepository>,
    pub interactions: Arc<InteractionService>,
    pub articles: Arc<ArticleService>,
    pub feed: Arc<FeedAggregator>,
}

impl AppContext {
    /// Wires stores, caches, and services from configuration. The returned
    /// intake must be driven by the caller (`tokio::spawn(intake.run())`),
    /// and the writer handle joined on shutdown.
    pub async fn new(config: ServerConfig) -> CoreResult<(Self, PublishIntake, CacheWriterHandle)> {
        config.validate()?;

        let (primary, replicas) = db::connect(&config.database).await?;
        db::test_connection(&primary).await?;
        let conn = cache::connect(&config.cache).await?;
        let (writer, writer_handle) = CacheWriter::spawn(&config.worker);

        let follows = Arc::new(FollowRepository::new(
            Arc::new(PgFollowStore::new(primary.clone(), Arc::clone(&replicas))),
            Arc::new(RedisFollowCache::new(conn.clone(), &config.cache)),
            writer.clone(),
        ));

        let interactions = Arc::new(InteractionService::new(
            Arc::new(PgCounterStore::new(primary.clone(), Arc::clone(&replicas))),
            Arc::new(RedisCounterCache::new(conn.clone(), &config.cache)),
            writer.clone(),
        ));

        let article_repo = Arc::new(ArticleRepository::new(
            Arc::new(PgArticleStore::new(primary.clone(), Arc::clone(&replicas))),
            Arc::new(RedisArticleCache::new(conn, &config.cache)),
            writer,
            config.feed.warm_content_max,
        ));

        let feed_store: Arc<dyn FeedStore> = Arc::new(PgFeedStore::new(primary, replicas));
        let dispatcher = FanoutDispatcher::new(
            Arc::clone(&feed_store),
            Arc::clone(&follows),
            config.feed.clone(),
        );
        let (producer, intake) = PublishIntake::channel(config.worker.queue_capacity, dispatcher);

        let articles = Arc::new(ArticleService::new(article_repo, producer));
        let feed = Arc::new(FeedAggregator::new(
            feed_store,
            Arc::clone(&follows),
            config.feed.follower_cap,
        ));

        let ctx = Self {
            config: Arc::new(config),
            follows,
            interactions,
            articles,
            feed,
        };
        Ok((ctx, intake, writer_handle))
    }
}
