/// Article persistence: a draft table (owner-visible) and a published table
/// (public), sharing ids. Publish syncs both inside one transaction.
use crate::db::ReplicaSet;
use crate::domain::{from_millis, Article, ArticleStatus};
use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgConnection, PgPool};
use sqlx::FromRow;
use std::sync::Arc;

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert a new draft, returning its id
    async fn insert(&self, article: &Article) -> CoreResult<i64>;

    /// Update an existing draft; OwnershipMismatch when (id, author_id)
    /// matches no row
    async fn update(&self, article: &Article) -> CoreResult<()>;

    /// Publish: save the draft (insert or update) and upsert the published
    /// row, in one transaction. Returns the article id.
    async fn sync(&self, article: &Article) -> CoreResult<i64>;

    /// Withdraw: flip the status on both rows in one transaction;
    /// OwnershipMismatch when the draft row does not match
    async fn sync_status(
        &self,
        author_id: i64,
        article_id: i64,
        status: ArticleStatus,
    ) -> CoreResult<()>;

    async fn list_by_author(
        &self,
        author_id: i64,
        offset: i64,
        limit: i64,
    ) -> CoreResult<Vec<Article>>;

    async fn get_by_id(&self, id: i64) -> CoreResult<Article>;

    async fn get_pub_by_id(&self, id: i64) -> CoreResult<Article>;
}

pub struct PgArticleStore {
    primary: PgPool,
    replicas: Arc<ReplicaSet>,
}

#[derive(FromRow)]
struct ArticleRow {
    id: i64,
    title: String,
    content: String,
    author_id: i64,
    status: i16,
    ctime: i64,
    utime: i64,
}

impl ArticleRow {
    fn into_domain(self) -> CoreResult<Article> {
        Ok(Article {
            id: self.id,
            title: self.title,
            content: self.content,
            author_id: self.author_id,
            status: ArticleStatus::from_i16(self.status)?,
            ctime: from_millis(self.ctime),
            utime: from_millis(self.utime),
        })
    }
}

impl PgArticleStore {
    pub fn new(primary: PgPool, replicas: Arc<ReplicaSet>) -> Self {
        Self { primary, replicas }
    }

    async fn insert_on(conn: &mut PgConnection, article: &Article, now: i64) -> CoreResult<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO articles (title, content, author_id, status, ctime, utime) \
             VALUES ($1, $2, $3, $4, $5, $5) RETURNING id",
        )
        .bind(&article.title)
        .bind(&article.content)
        .bind(article.author_id)
        .bind(article.status.as_i16())
        .bind(now)
        .fetch_one(conn)
        .await?;
        Ok(id)
    }

    async fn update_on(conn: &mut PgConnection, article: &Article, now: i64) -> CoreResult<()> {
        let res = sqlx::query(
            "UPDATE articles SET title = $1, content = $2, status = $3, utime = $4 \
             WHERE id = $5 AND author_id = $6",
        )
        .bind(&article.title)
        .bind(&article.content)
        .bind(article.status.as_i16())
        .bind(now)
        .bind(article.id)
        .bind(article.author_id)
        .execute(conn)
        .await?;

        if res.rows_affected() == 0 {
            return Err(CoreError::OwnershipMismatch {
                article_id: article.id,
                author_id: article.author_id,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ArticleStore for PgArticleStore {
    async fn insert(&self, article: &Article) -> CoreResult<i64> {
        let now = Utc::now().timestamp_millis();
        let mut conn = self.primary.acquire().await?;
        Self::insert_on(&mut *conn, article, now).await
    }

    async fn update(&self, article: &Article) -> CoreResult<()> {
        let now = Utc::now().timestamp_millis();
        let mut conn = self.primary.acquire().await?;
        Self::update_on(&mut *conn, article, now).await
    }

    async fn sync(&self, article: &Article) -> CoreResult<i64> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.primary.begin().await?;

        let id = if article.id > 0 {
            Self::update_on(&mut *tx, article, now).await?;
            article.id
        } else {
            Self::insert_on(&mut *tx, article, now).await?
        };

        sqlx::query(
            "INSERT INTO published_articles (id, title, content, author_id, status, ctime, utime) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) \
             ON CONFLICT (id) \
             DO UPDATE SET title = $2, content = $3, status = $5, utime = $6",
        )
        .bind(id)
        .bind(&article.title)
        .bind(&article.content)
        .bind(article.author_id)
        .bind(article.status.as_i16())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(id)
    }

    async fn sync_status(
        &self,
        author_id: i64,
        article_id: i64,
        status: ArticleStatus,
    ) -> CoreResult<()> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.primary.begin().await?;

        let res = sqlx::query(
            "UPDATE articles SET status = $1, utime = $2 WHERE id = $3 AND author_id = $4",
        )
        .bind(status.as_i16())
        .bind(now)
        .bind(article_id)
        .bind(author_id)
        .execute(&mut *tx)
        .await?;

        if res.rows_affected() == 0 {
            return Err(CoreError::OwnershipMismatch {
                article_id,
                author_id,
            });
        }

        sqlx::query("UPDATE published_articles SET status = $1, utime = $2 WHERE id = $3")
            .bind(status.as_i16())
            .bind(now)
            .bind(article_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_by_author(
        &self,
        author_id: i64,
        offset: i64,
        limit: i64,
    ) -> CoreResult<Vec<Article>> {
        let rows: Vec<ArticleRow> = sqlx::query_as(
            "SELECT id, title, content, author_id, status, ctime, utime FROM articles \
             WHERE author_id = $1 ORDER BY utime DESC LIMIT $2 OFFSET $3",
        )
        .bind(author_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.replicas.replica())
        .await?;

        rows.into_iter().map(ArticleRow::into_domain).collect()
    }

    async fn get_by_id(&self, id: i64) -> CoreResult<Article> {
        let row: Option<ArticleRow> = sqlx::query_as(
            "SELECT id, title, content, author_id, status, ctime, utime FROM articles \
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.replicas.replica())
        .await?;

        row.ok_or_else(|| CoreError::NotFound(format!("article {id}")))?
            .into_domain()
    }

    async fn get_pub_by_id(&self, id: i64) -> CoreResult<Article> {
        let row: Option<ArticleRow> = sqlx::query_as(
            "SELECT id, title, content, author_id, status, ctime, utime FROM published_articles \
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.replicas.replica())
        .await?;

        row.ok_or_else(|| CoreError::NotFound(format!("published article {id}")))?
            .into_domain()
    }
}
