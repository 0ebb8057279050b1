/// Article cache: whole-value JSON entries in three namespaces
///
/// `article:list:{uid}` holds an author's cached first page,
/// `article:detail:{id}` the draft detail, `article:pub:{id}` the published
/// detail. All entries are advisory within a 10 minute TTL.
use crate::cache::build_key;
use crate::config::CacheConfig;
use crate::domain::{Article, ArticleSummary};
use crate::error::CoreResult;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

#[async_trait]
pub trait ArticleCache: Send + Sync {
    async fn first_page(&self, uid: i64) -> CoreResult<Option<Vec<ArticleSummary>>>;

    async fn set_first_page(&self, uid: i64, page: &[ArticleSummary]) -> CoreResult<()>;

    async fn del_first_page(&self, uid: i64) -> CoreResult<()>;

    async fn detail(&self, id: i64) -> CoreResult<Option<Article>>;

    async fn set_detail(&self, article: &Article) -> CoreResult<()>;

    async fn pub_detail(&self, id: i64) -> CoreResult<Option<Article>>;

    async fn set_pub_detail(&self, article: &Article) -> CoreResult<()>;
}

pub struct RedisArticleCache {
    conn: ConnectionManager,
    prefix: String,
    ttl: u64,
}

impl RedisArticleCache {
    pub fn new(conn: ConnectionManager, config: &CacheConfig) -> Self {
        Self {
            conn,
            prefix: config.key_prefix.clone(),
            ttl: config.article_ttl,
        }
    }

    fn list_key(&self, uid: i64) -> String {
        build_key(&self.prefix, &["article", "list", &uid.to_string()])
    }

    fn detail_key(&self, id: i64) -> String {
        build_key(&self.prefix, &["article", "detail", &id.to_string()])
    }

    fn pub_key(&self, id: i64) -> String {
        build_key(&self.prefix, &["article", "pub", &id.to_string()])
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> CoreResult<Option<T>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set_json<T: serde::Serialize>(&self, key: &str, value: &T) -> CoreResult<()> {
        let json = serde_json::to_string(value)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, json, self.ttl).await?;
        Ok(())
    }
}

#[async_trait]
impl ArticleCache for RedisArticleCache {
    async fn first_page(&self, uid: i64) -> CoreResult<Option<Vec<ArticleSummary>>> {
        self.get_json(&self.list_key(uid)).await
    }

    async fn set_first_page(&self, uid: i64, page: &[ArticleSummary]) -> CoreResult<()> {
        self.set_json(&self.list_key(uid), &page).await
    }

    async fn del_first_page(&self, uid: i64) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(&self.list_key(uid)).await?;
        Ok(())
    }

    async fn detail(&self, id: i64) -> CoreResult<Option<Article>> {
        self.get_json(&self.detail_key(id)).await
    }

    async fn set_detail(&self, article: &Article) -> CoreResult<()> {
        self.set_json(&self.detail_key(article.id), article).await
    }

    async fn pub_detail(&self, id: i64) -> CoreResult<Option<Article>> {
        self.get_json(&self.pub_key(id)).await
    }

    async fn set_pub_detail(&self, article: &Article) -> CoreResult<()> {
        self.set_json(&self.pub_key(article.id), article).await
    }
}
