/// Article use cases on top of the repository, plus publish intake wiring
use crate::article::ArticleRepository;
use crate::domain::{Article, ArticleStatus, ArticleSummary};
use crate::error::{CoreError, CoreResult};
use crate::feed::{PublishEvent, PublishProducer};
use std::sync::Arc;
use tracing::warn;

pub struct ArticleService {
    repo: Arc<ArticleRepository>,
    publisher: PublishProducer,
}

impl ArticleService {
    pub fn new(repo: Arc<ArticleRepository>, publisher: PublishProducer) -> Self {
        Self { repo, publisher }
    }

    /// Save a draft without publishing it. An id of zero means a new
    /// article; otherwise the existing draft is updated in place.
    pub async fn save(&self, mut article: Article) -> CoreResult<i64> {
        article.status = ArticleStatus::Unpublished;
        if article.id > 0 {
            self.repo.update(&article).await?;
            Ok(article.id)
        } else {
            self.repo.insert(&article).await
        }
    }

    /// Publish: sync the draft into the published table, then enqueue the
    /// fan-out event. The publish itself has already committed when the
    /// enqueue runs; an intake failure loses the feed event, not the
    /// article, and is logged rather than surfaced.
    pub async fn publish(&self, mut article: Article) -> CoreResult<i64> {
        article.status = ArticleStatus::Published;
        let id = self.repo.sync(&article).await?;

        if let Err(e) = self
            .publisher
            .publish(PublishEvent {
                author_id: article.author_id,
                article_id: id,
                title: article.title.clone(),
            })
            .await
        {
            warn!(article_id = id, "feed event for publish was lost: {e}");
        }

        Ok(id)
    }

    /// Withdraw a published article to private on both tables.
    pub async fn withdraw(&self, author_id: i64, article_id: i64) -> CoreResult<()> {
        self.repo
            .sync_status(author_id, article_id, ArticleStatus::Private)
            .await
    }

    /// Draft detail, visible only to its author.
    pub async fn detail(&self, requester: i64, id: i64) -> CoreResult<Article> {
        let article = self.repo.get(id).await?;
        if article.author_id != requester {
            return Err(CoreError::OwnershipMismatch {
                article_id: id,
                author_id: requester,
            });
        }
        Ok(article)
    }

    /// Published detail, visible to anyone.
    pub async fn pub_detail(&self, id: i64) -> CoreResult<Article> {
        self.repo.get_published(id).await
    }

    pub async fn list(
        &self,
        author_id: i64,
        offset: i64,
        limit: i64,
    ) -> CoreResult<Vec<ArticleSummary>> {
        self.repo.list_by_author(author_id, offset, limit).await
    }
}
