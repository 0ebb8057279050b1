/// Follow graph persistence
///
/// A follow/unfollow updates the relation row and both users' aggregate
/// counts inside one transaction, or not at all. Unfollow deactivates the
/// row; re-follow is a reactivating upsert. Counter bumps are guarded by
/// the relation's state transition so repeated calls cannot skew counts.
use crate::db::ReplicaSet;
use crate::domain::{FollowData, FollowRelation, RelationState};
use crate::error::CoreResult;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use std::sync::Arc;

#[async_trait]
pub trait FollowStore: Send + Sync {
    /// Activate a follow edge; counts move only when the edge actually
    /// transitions to active
    async fn insert_follow(&self, follower: i64, followee: i64) -> CoreResult<()>;

    /// Soft-deactivate a follow edge; idempotent
    async fn deactivate_follow(&self, follower: i64, followee: i64) -> CoreResult<()>;

    async fn get_followed(&self, follower: i64, followee: i64) -> CoreResult<bool>;

    /// Aggregate counts; a user with no row has zero counts
    async fn follow_data(&self, uid: i64) -> CoreResult<FollowData>;

    async fn followee_list(&self, follower: i64, limit: i64, offset: i64)
        -> CoreResult<Vec<FollowRelation>>;

    async fn follower_list(&self, followee: i64, limit: i64, offset: i64)
        -> CoreResult<Vec<FollowRelation>>;
}

pub struct PgFollowStore {
    primary: PgPool,
    replicas: Arc<ReplicaSet>,
}

impl PgFollowStore {
    pub fn new(primary: PgPool, replicas: Arc<ReplicaSet>) -> Self {
        Self { primary, replicas }
    }
}

#[derive(FromRow)]
struct FollowDataRow {
    uid: i64,
    followers: i64,
    followees: i64,
}

#[derive(FromRow)]
struct RelationRow {
    follower: i64,
    followee: i64,
    state: i16,
}

#[async_trait]
impl FollowStore for PgFollowStore {
    async fn insert_follow(&self, follower: i64, followee: i64) -> CoreResult<()> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.primary.begin().await?;

        // Reactivating upsert; the WHERE clause makes a repeat follow a
        // zero-row no-op so the counters below stay exact.
        let res = sqlx::query(
            "INSERT INTO follow_relations (follower, followee, state, ctime, utime) \
             VALUES ($1, $2, $3, $4, $4) \
             ON CONFLICT (follower, followee) \
             DO UPDATE SET state = $3, utime = $4 WHERE follow_relations.state = $5",
        )
        .bind(follower)
        .bind(followee)
        .bind(RelationState::Active.as_i16())
        .bind(now)
        .bind(RelationState::Inactive.as_i16())
        .execute(&mut *tx)
        .await?;

        if res.rows_affected() == 1 {
            sqlx::query(
                "INSERT INTO follow_data (uid, followers, followees, ctime, utime) \
                 VALUES ($1, 0, 1, $2, $2) \
                 ON CONFLICT (uid) \
                 DO UPDATE SET followees = follow_data.followees + 1, utime = $2",
            )
            .bind(follower)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO follow_data (uid, followers, followees, ctime, utime) \
                 VALUES ($1, 1, 0, $2, $2) \
                 ON CONFLICT (uid) \
                 DO UPDATE SET followers = follow_data.followers + 1, utime = $2",
            )
            .bind(followee)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn deactivate_follow(&self, follower: i64, followee: i64) -> CoreResult<()> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.primary.begin().await?;

        let res = sqlx::query(
            "UPDATE follow_relations SET state = $3, utime = $4 \
             WHERE follower = $1 AND followee = $2 AND state = $5",
        )
        .bind(follower)
        .bind(followee)
        .bind(RelationState::Inactive.as_i16())
        .bind(now)
        .bind(RelationState::Active.as_i16())
        .execute(&mut *tx)
        .await?;

        if res.rows_affected() == 1 {
            sqlx::query(
                "UPDATE follow_data SET followees = followees - 1, utime = $2 WHERE uid = $1",
            )
            .bind(follower)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "UPDATE follow_data SET followers = followers - 1, utime = $2 WHERE uid = $1",
            )
            .bind(followee)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_followed(&self, follower: i64, followee: i64) -> CoreResult<bool> {
        let state: Option<i16> = sqlx::query_scalar(
            "SELECT state FROM follow_relations \
             WHERE follower = $1 AND followee = $2",
        )
        .bind(follower)
        .bind(followee)
        .fetch_optional(self.replicas.replica())
        .await?;

        Ok(state.map(RelationState::from_i16).is_some_and(RelationState::is_active))
    }

    async fn follow_data(&self, uid: i64) -> CoreResult<FollowData> {
        let row: Option<FollowDataRow> = sqlx::query_as(
            "SELECT uid, followers, followees FROM follow_data WHERE uid = $1",
        )
        .bind(uid)
        .fetch_optional(self.replicas.replica())
        .await?;

        Ok(row
            .map(|r| FollowData {
                uid: r.uid,
                followers: r.followers,
                followees: r.followees,
            })
            .unwrap_or(FollowData {
                uid,
                ..FollowData::default()
            }))
    }

    async fn followee_list(
        &self,
        follower: i64,
        limit: i64,
        offset: i64,
    ) -> CoreResult<Vec<FollowRelation>> {
        let rows: Vec<RelationRow> = sqlx::query_as(
            "SELECT follower, followee, state FROM follow_relations \
             WHERE follower = $1 AND state = $4 ORDER BY id LIMIT $2 OFFSET $3",
        )
        .bind(follower)
        .bind(limit)
        .bind(offset)
        .bind(RelationState::Active.as_i16())
        .fetch_all(self.replicas.replica())
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| FollowRelation {
                follower: r.follower,
                followee: r.followee,
                state: RelationState::from_i16(r.state),
            })
            .collect())
    }

    async fn follower_list(
        &self,
        followee: i64,
        limit: i64,
        offset: i64,
    ) -> CoreResult<Vec<FollowRelation>> {
        let rows: Vec<RelationRow> = sqlx::query_as(
            "SELECT follower, followee, state FROM follow_relations \
             WHERE followee = $1 AND state = $4 ORDER BY id LIMIT $2 OFFSET $3",
        )
        .bind(followee)
        .bind(limit)
        .bind(offset)
        .bind(RelationState::Active.as_i16())
        .fetch_all(self.replicas.replica())
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| FollowRelation {
                follower: r.follower,
                followee: r.followee,
                state: RelationState::from_i16(r.state),
            })
            .collect())
    }
}
