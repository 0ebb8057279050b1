/// The two physical feed logs
///
/// `feed_pull_events` holds one row per publish, owned by the author;
/// `feed_push_events` holds one row per follower per publish, owned by the
/// follower. Rows are immutable; the extension payload is stored as JSON.
use crate::db::ReplicaSet;
use crate::domain::{from_millis, to_millis, ExtendFields, FeedEvent};
use crate::error::CoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::{FromRow, Postgres, QueryBuilder};
use std::sync::Arc;

#[async_trait]
pub trait FeedStore: Send + Sync {
    async fn create_pull_event(&self, event: &FeedEvent) -> CoreResult<()>;

    /// Batch-insert one inbox row per follower
    async fn create_push_events(&self, events: &[FeedEvent]) -> CoreResult<()>;

    /// Pull-log rows owned by any of `owner_uids`, newest first
    async fn pull_events(
        &self,
        owner_uids: &[i64],
        before: DateTime<Utc>,
        limit: i64,
    ) -> CoreResult<Vec<FeedEvent>>;

    /// Push-inbox rows owned by `owner_uid`, newest first
    async fn push_events(
        &self,
        owner_uid: i64,
        before: DateTime<Utc>,
        limit: i64,
    ) -> CoreResult<Vec<FeedEvent>>;
}

pub struct PgFeedStore {
    primary: PgPool,
    replicas: Arc<ReplicaSet>,
}

#[derive(FromRow)]
struct FeedEventRow {
    id: i64,
    owner_uid: i64,
    event_type: String,
    payload: String,
    ctime: i64,
}

impl FeedEventRow {
    fn into_domain(self) -> FeedEvent {
        FeedEvent {
            id: self.id,
            owner_uid: self.owner_uid,
            event_type: self.event_type,
            ctime: from_millis(self.ctime),
            // A payload that fails to parse degrades to empty extensions
            // rather than poisoning the whole page.
            ext: serde_json::from_str(&self.payload).unwrap_or_default(),
        }
    }
}

fn encode_ext(ext: &ExtendFields) -> CoreResult<String> {
    Ok(serde_json::to_string(ext)?)
}

impl PgFeedStore {
    pub fn new(primary: PgPool, replicas: Arc<ReplicaSet>) -> Self {
        Self { primary, replicas }
    }
}

#[async_trait]
impl FeedStore for PgFeedStore {
    async fn create_pull_event(&self, event: &FeedEvent) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO feed_pull_events (owner_uid, event_type, payload, ctime) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(event.owner_uid)
        .bind(&event.event_type)
        .bind(encode_ext(&event.ext)?)
        .bind(to_millis(event.ctime))
        .execute(&self.primary)
        .await?;
        Ok(())
    }

    async fn create_push_events(&self, events: &[FeedEvent]) -> CoreResult<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut payloads = Vec::with_capacity(events.len());
        for event in events {
            payloads.push(encode_ext(&event.ext)?);
        }

        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO feed_push_events (owner_uid, event_type, payload, ctime) ");
        qb.push_values(events.iter().zip(payloads), |mut b, (event, payload)| {
            b.push_bind(event.owner_uid)
                .push_bind(&event.event_type)
                .push_bind(payload)
                .push_bind(to_millis(event.ctime));
        });
        qb.build().execute(&self.primary).await?;
        Ok(())
    }

    async fn pull_events(
        &self,
        owner_uids: &[i64],
        before: DateTime<Utc>,
        limit: i64,
    ) -> CoreResult<Vec<FeedEvent>> {
        if owner_uids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<FeedEventRow> = sqlx::query_as(
            "SELECT id, owner_uid, event_type, payload, ctime FROM feed_pull_events \
             WHERE owner_uid = ANY($1) AND ctime < $2 ORDER BY ctime DESC LIMIT $3",
        )
        .bind(owner_uids.to_vec())
        .bind(to_millis(before))
        .bind(limit)
        .fetch_all(self.replicas.replica())
        .await?;

        Ok(rows.into_iter().map(FeedEventRow::into_domain).collect())
    }

    async fn push_events(
        &self,
        owner_uid: i64,
        before: DateTime<Utc>,
        limit: i64,
    ) -> CoreResult<Vec<FeedEvent>> {
        let rows: Vec<FeedEventRow> = sqlx::query_as(
            "SELECT id, owner_uid, event_type, payload, ctime FROM feed_push_events \
             WHERE owner_uid = $1 AND ctime < $2 ORDER BY ctime DESC LIMIT $3",
        )
        .bind(owner_uid)
        .bind(to_millis(before))
        .bind(limit)
        .fetch_all(self.replicas.replica())
        .await?;

        Ok(rows.into_iter().map(FeedEventRow::into_domain).collect())
    }
}
