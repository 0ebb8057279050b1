/// Domain types shared across the feed, follow, article, and interaction
/// subsystems
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Feed event type for article publishes. Other event families (read, like,
/// collect notifications) share the same row shape and extension mapping.
pub const ARTICLE_FEED_EVENT: &str = "article_feed_event";

/// Extension field names carried by article publish events
pub mod ext_fields {
    pub const AUTHOR_UID: &str = "uid";
    pub const ARTICLE_ID: &str = "aid";
    pub const TITLE: &str = "title";
}

/// Event-specific payload attached to a feed event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtendFields(pub BTreeMap<String, String>);

impl ExtendFields {
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> CoreResult<&str> {
        self.0
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| CoreError::MissingField(key.to_string()))
    }

    pub fn get_i64(&self, key: &str) -> CoreResult<i64> {
        let raw = self.get(key)?;
        raw.parse().map_err(|_| CoreError::MalformedField {
            field: key.to_string(),
            value: raw.to_string(),
        })
    }
}

/// One row in either feed log.
///
/// Pull-log rows are owned by the author; push-inbox rows are owned by each
/// follower. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEvent {
    pub id: i64,
    pub owner_uid: i64,
    pub event_type: String,
    pub ctime: DateTime<Utc>,
    pub ext: ExtendFields,
}

/// Soft-deactivation state for follow relations and like/collect membership.
///
/// A tagged variant rather than a bool, leaving room for further states
/// without a schema change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationState {
    Inactive,
    Active,
}

impl RelationState {
    pub fn is_active(self) -> bool {
        matches!(self, RelationState::Active)
    }

    pub fn as_i16(self) -> i16 {
        match self {
            RelationState::Inactive => 0,
            RelationState::Active => 1,
        }
    }

    pub fn from_i16(v: i16) -> Self {
        if v == 1 {
            RelationState::Active
        } else {
            RelationState::Inactive
        }
    }
}

/// Per-user aggregate follow counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowData {
    pub uid: i64,
    pub followers: i64,
    pub followees: i64,
}

/// One edge of the follow graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowRelation {
    pub follower: i64,
    pub followee: i64,
    pub state: RelationState,
}

/// Engagement counters for one piece of content, keyed by (biz, biz_id)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub read_cnt: i64,
    pub like_cnt: i64,
    pub collect_cnt: i64,
}

/// Counters plus the calling user's membership flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteractionSummary {
    pub counters: Counters,
    pub is_liked: bool,
    pub is_collected: bool,
}

/// Article lifecycle status. Transitions are one-directional:
/// Unpublished -> Published -> Private (withdrawn).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArticleStatus {
    Unpublished,
    Published,
    Private,
}

impl ArticleStatus {
    pub fn as_i16(self) -> i16 {
        match self {
            ArticleStatus::Unpublished => 0,
            ArticleStatus::Published => 1,
            ArticleStatus::Private => 2,
        }
    }

    pub fn from_i16(v: i16) -> CoreResult<Self> {
        match v {
            0 => Ok(ArticleStatus::Unpublished),
            1 => Ok(ArticleStatus::Published),
            2 => Ok(ArticleStatus::Private),
            other => Err(CoreError::Internal(format!("unknown article status {other}"))),
        }
    }
}

/// An article. The draft row is owner-visible; the published row is public.
/// Both share the same id and may diverge until the next publish sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// 0 means not yet persisted
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub status: ArticleStatus,
    pub ctime: DateTime<Utc>,
    pub utime: DateTime<Utc>,
}

/// List element for an author's article list; carries a content preview
/// instead of the full body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub id: i64,
    pub title: String,
    pub preview: String,
    pub status: ArticleStatus,
    pub ctime: DateTime<Utc>,
    pub utime: DateTime<Utc>,
}

impl ArticleSummary {
    pub fn from_article(art: &Article) -> Self {
        Self {
            id: art.id,
            title: art.title.clone(),
            preview: preview_of(&art.content),
            status: art.status,
            ctime: art.ctime,
            utime: art.utime,
        }
    }
}

const PREVIEW_CHARS: usize = 128;

/// First 128 characters of the content, on char boundaries
pub fn preview_of(content: &str) -> String {
    content.chars().take(PREVIEW_CHARS).collect()
}

/// Timestamps are persisted as epoch milliseconds
pub fn to_millis(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

pub fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
