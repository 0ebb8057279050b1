/// Fan-out dispatcher: push vs. pull per publish, by follower cardinality
use crate::config::FeedConfig;
use crate::domain::{ext_fields, ExtendFields, FeedEvent, ARTICLE_FEED_EVENT};
use crate::error::CoreResult;
use crate::feed::store::FeedStore;
use crate::follow::FollowRepository;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// A publish consumed from the intake channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishEvent {
    pub author_id: i64,
    pub article_id: i64,
    pub title: String,
}

impl PublishEvent {
    fn ext(&self) -> ExtendFields {
        let mut ext = ExtendFields::default();
        ext.insert(ext_fields::AUTHOR_UID, self.author_id.to_string());
        ext.insert(ext_fields::ARTICLE_ID, self.article_id.to_string());
        ext.insert(ext_fields::TITLE, self.title.clone());
        ext
    }
}

pub struct FanoutDispatcher {
    feed: Arc<dyn FeedStore>,
    follows: Arc<FollowRepository>,
    config: FeedConfig,
}

impl FanoutDispatcher {
    pub fn new(feed: Arc<dyn FeedStore>, follows: Arc<FollowRepository>, config: FeedConfig) -> Self {
        Self {
            feed,
            follows,
            config,
        }
    }

    /// Route one publish.
    ///
    /// The decision reads the follower count as of right now; a given author
    /// may land in either log across publishes, which is why the aggregator
    /// always reads both. Above the threshold a single pull-log row is
    /// written; otherwise the follower list is enumerated (bounded by the
    /// configured cap) and one inbox row is written per follower.
    ///
    /// A lookup or enumeration failure fails the publish for that stage.
    /// Push fan-out is at-least-effort: a batch failure leaves no cross-store
    /// rollback of rows already written by a prior delivery.
    pub async fn dispatch(&self, publish: &PublishEvent) -> CoreResult<()> {
        let data = self.follows.follow_data(publish.author_id).await?;
        let now = Utc::now();
        let ext = publish.ext();

        if data.followers > self.config.fanout_threshold {
            info!(
                author = publish.author_id,
                followers = data.followers,
                "fan-out on read: one pull-log row"
            );
            self.feed
                .create_pull_event(&FeedEvent {
                    id: 0,
                    owner_uid: publish.author_id,
                    event_type: ARTICLE_FEED_EVENT.to_string(),
                    ctime: now,
                    ext,
                })
                .await
        } else {
            let followers = self
                .follows
                .follower_list(publish.author_id, self.config.follower_cap, 0)
                .await?;
            info!(
                author = publish.author_id,
                followers = followers.len(),
                "fan-out on write: one inbox row per follower"
            );
            let events: Vec<FeedEvent> = followers
                .iter()
                .map(|relation| FeedEvent {
                    id: 0,
                    owner_uid: relation.follower,
                    event_type: ARTICLE_FEED_EVENT.to_string(),
                    ctime: now,
                    ext: ext.clone(),
                })
                .collect();
            self.feed.create_push_events(&events).await
        }
    }
}
