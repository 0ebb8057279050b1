/// Article subsystem: cache-aside reads and write-path invalidation for
/// draft and published content
pub mod cache;
pub mod service;
pub mod store;

pub use cache::{ArticleCache, RedisArticleCache};
pub use service::ArticleService;
pub use store::{ArticleStore, PgArticleStore};

use crate::domain::{Article, ArticleStatus, ArticleSummary};
use crate::error::CoreResult;
use crate::tasks::CacheWriter;
use std::sync::Arc;
use tracing::warn;

pub struct ArticleRepository {
    store: Arc<dyn ArticleStore>,
    cache: Arc<dyn ArticleCache>,
    writer: CacheWriter,
    /// Content size ceiling for opportunistic detail warming
    warm_content_max: usize,
}

impl ArticleRepository {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        cache: Arc<dyn ArticleCache>,
        writer: CacheWriter,
        warm_content_max: usize,
    ) -> Self {
        Self {
            store,
            cache,
            writer,
            warm_content_max,
        }
    }

    /// Best-effort first-page invalidation; a failure widens the staleness
    /// window but never fails the triggering write.
    async fn invalidate_first_page(&self, uid: i64) {
        if let Err(e) = self.cache.del_first_page(uid).await {
            warn!(uid, "first-page invalidation failed: {e}");
        }
    }

    pub async fn insert(&self, article: &Article) -> CoreResult<i64> {
        let id = self.store.insert(article).await?;
        self.invalidate_first_page(article.author_id).await;
        Ok(id)
    }

    /// Invalidate both before and after the store write: if the store write
    /// fails after the first delete, no stale page lingers for the full TTL.
    pub async fn update(&self, article: &Article) -> CoreResult<()> {
        self.invalidate_first_page(article.author_id).await;
        self.store.update(article).await?;
        self.invalidate_first_page(article.author_id).await;
        Ok(())
    }

    /// Publish: sync both store rows, then asynchronously drop the author's
    /// first page and warm the published detail for the expected
    /// read-after-publish.
    pub async fn sync(&self, article: &Article) -> CoreResult<i64> {
        let id = self.store.sync(article).await?;

        let cache = Arc::clone(&self.cache);
        let mut published = article.clone();
        published.id = id;
        self.writer.submit("publish cache sync", async move {
            cache.del_first_page(published.author_id).await?;
            cache.set_pub_detail(&published).await
        });

        Ok(id)
    }

    pub async fn sync_status(
        &self,
        author_id: i64,
        article_id: i64,
        status: ArticleStatus,
    ) -> CoreResult<()> {
        self.store.sync_status(author_id, article_id, status).await?;
        self.invalidate_first_page(author_id).await;
        Ok(())
    }

    /// Author's article list. Only the first page is cached as a whole;
    /// any other offset bypasses the cache entirely.
    pub async fn list_by_author(
        &self,
        author_id: i64,
        offset: i64,
        limit: i64,
    ) -> CoreResult<Vec<ArticleSummary>> {
        if offset == 0 {
            match self.cache.first_page(author_id).await {
                Ok(Some(page)) => return Ok(page),
                Ok(None) => {}
                Err(e) => warn!(author_id, "first-page cache read failed: {e}"),
            }
        }

        let articles = self.store.list_by_author(author_id, offset, limit).await?;
        let page: Vec<ArticleSummary> =
            articles.iter().map(ArticleSummary::from_article).collect();

        if offset == 0 && !page.is_empty() {
            let cache = Arc::clone(&self.cache);
            let summaries = page.clone();
            // Warm the detail of the first item too, anticipating an
            // immediate click-through; oversized bodies are skipped.
            let first = articles
                .into_iter()
                .next()
                .filter(|a| a.content.len() < self.warm_content_max);
            self.writer.submit("first-page warm", async move {
                cache.set_first_page(author_id, &summaries).await?;
                if let Some(article) = first {
                    cache.set_detail(&article).await?;
                }
                Ok(())
            });
        }

        Ok(page)
    }

    pub async fn get(&self, id: i64) -> CoreResult<Article> {
        match self.cache.detail(id).await {
            Ok(Some(article)) => return Ok(article),
            Ok(None) => {}
            Err(e) => warn!(id, "detail cache read failed: {e}"),
        }

        let article = self.store.get_by_id(id).await?;

        let cache = Arc::clone(&self.cache);
        let warmed = article.clone();
        self.writer.submit("article detail warm", async move {
            cache.set_detail(&warmed).await
        });

        Ok(article)
    }

    pub async fn get_published(&self, id: i64) -> CoreResult<Article> {
        match self.cache.pub_detail(id).await {
            Ok(Some(article)) => return Ok(article),
            Ok(None) => {}
            Err(e) => warn!(id, "published detail cache read failed: {e}"),
        }

        let article = self.store.get_pub_by_id(id).await?;

        let cache = Arc::clone(&self.cache);
        let warmed = article.clone();
        self.writer.submit("published detail warm", async move {
            cache.set_pub_detail(&warmed).await
        });

        Ok(article)
    }
}
