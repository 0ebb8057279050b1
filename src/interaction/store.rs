/// Durable engagement counters and membership rows
///
/// Aggregates are upsert-on-conflict: insert with count 1 or atomically add
/// one on collision. Like/collect membership rows soft-deactivate, and the
/// aggregate only moves when the membership row actually changes state.
/// The second `like` in a row is a zero-row no-op, which is what keeps the
/// counter from double counting under repeated or redelivered calls.
use crate::db::ReplicaSet;
use crate::domain::Counters;
use crate::error::CoreResult;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use std::sync::Arc;

#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn incr_read(&self, biz: &str, biz_id: i64) -> CoreResult<()>;

    /// Returns true when the membership actually transitioned to active
    async fn activate_like(&self, biz: &str, biz_id: i64, uid: i64) -> CoreResult<bool>;

    /// Returns true when the membership actually transitioned to inactive
    async fn deactivate_like(&self, biz: &str, biz_id: i64, uid: i64) -> CoreResult<bool>;

    async fn activate_collect(&self, biz: &str, biz_id: i64, uid: i64) -> CoreResult<bool>;

    async fn deactivate_collect(&self, biz: &str, biz_id: i64, uid: i64) -> CoreResult<bool>;

    /// Aggregate counters; content nobody has touched reads as zeros
    async fn counters(&self, biz: &str, biz_id: i64) -> CoreResult<Counters>;

    async fn is_liked(&self, biz: &str, biz_id: i64, uid: i64) -> CoreResult<bool>;

    async fn is_collected(&self, biz: &str, biz_id: i64, uid: i64) -> CoreResult<bool>;

    /// Active collected content ids for one user
    async fn collection_list(&self, biz: &str, uid: i64) -> CoreResult<Vec<i64>>;
}

pub struct PgCounterStore {
    primary: PgPool,
    replicas: Arc<ReplicaSet>,
}

impl PgCounterStore {
    pub fn new(primary: PgPool, replicas: Arc<ReplicaSet>) -> Self {
        Self { primary, replicas }
    }

    /// Shared shape of the like/collect toggles: upsert the membership row
    /// guarded on its state, and move the aggregate only on a transition.
    async fn toggle(
        &self,
        membership_table: &str,
        counter_column: &str,
        biz: &str,
        biz_id: i64,
        uid: i64,
        activate: bool,
    ) -> CoreResult<bool> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.primary.begin().await?;

        let membership_sql = if activate {
            format!(
                "INSERT INTO {membership_table} (uid, biz, biz_id, state, ctime, utime) \
                 VALUES ($1, $2, $3, 1, $4, $4) \
                 ON CONFLICT (uid, biz, biz_id) \
                 DO UPDATE SET state = 1, utime = $4 WHERE {membership_table}.state = 0"
            )
        } else {
            format!(
                "UPDATE {membership_table} SET state = 0, utime = $4 \
                 WHERE uid = $1 AND biz = $2 AND biz_id = $3 AND state = 1"
            )
        };
        let res = sqlx::query(&membership_sql)
            .bind(uid)
            .bind(biz)
            .bind(biz_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        let transitioned = res.rows_affected() == 1;

        if transitioned {
            let counter_sql = if activate {
                format!(
                    "INSERT INTO interactions (biz, biz_id, {counter_column}, ctime, utime) \
                     VALUES ($1, $2, 1, $3, $3) \
                     ON CONFLICT (biz, biz_id) \
                     DO UPDATE SET {counter_column} = interactions.{counter_column} + 1, utime = $3"
                )
            } else {
                format!(
                    "UPDATE interactions SET {counter_column} = {counter_column} - 1, utime = $3 \
                     WHERE biz = $1 AND biz_id = $2"
                )
            };
            sqlx::query(&counter_sql)
                .bind(biz)
                .bind(biz_id)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(transitioned)
    }

    async fn membership_active(
        &self,
        membership_table: &str,
        biz: &str,
        biz_id: i64,
        uid: i64,
    ) -> CoreResult<bool> {
        let sql = format!(
            "SELECT 1 FROM {membership_table} \
             WHERE uid = $1 AND biz = $2 AND biz_id = $3 AND state = 1"
        );
        let active: Option<i64> = sqlx::query_scalar(&sql)
            .bind(uid)
            .bind(biz)
            .bind(biz_id)
            .fetch_optional(self.replicas.replica())
            .await?;
        Ok(active.is_some())
    }
}

#[derive(FromRow)]
struct CountersRow {
    read_cnt: i64,
    like_cnt: i64,
    collect_cnt: i64,
}

#[async_trait]
impl CounterStore for PgCounterStore {
    async fn incr_read(&self, biz: &str, biz_id: i64) -> CoreResult<()> {
        let now = Utc::now().timestamp_millis();
        sqlx::query(
            "INSERT INTO interactions (biz, biz_id, read_cnt, ctime, utime) \
             VALUES ($1, $2, 1, $3, $3) \
             ON CONFLICT (biz, biz_id) \
             DO UPDATE SET read_cnt = interactions.read_cnt + 1, utime = $3",
        )
        .bind(biz)
        .bind(biz_id)
        .bind(now)
        .execute(&self.primary)
        .await?;
        Ok(())
    }

    async fn activate_like(&self, biz: &str, biz_id: i64, uid: i64) -> CoreResult<bool> {
        self.toggle("user_likes", "like_cnt", biz, biz_id, uid, true)
            .await
    }

    async fn deactivate_like(&self, biz: &str, biz_id: i64, uid: i64) -> CoreResult<bool> {
        self.toggle("user_likes", "like_cnt", biz, biz_id, uid, false)
            .await
    }

    async fn activate_collect(&self, biz: &str, biz_id: i64, uid: i64) -> CoreResult<bool> {
        self.toggle("user_collections", "collect_cnt", biz, biz_id, uid, true)
            .await
    }

    async fn deactivate_collect(&self, biz: &str, biz_id: i64, uid: i64) -> CoreResult<bool> {
        self.toggle("user_collections", "collect_cnt", biz, biz_id, uid, false)
            .await
    }

    async fn counters(&self, biz: &str, biz_id: i64) -> CoreResult<Counters> {
        let row: Option<CountersRow> = sqlx::query_as(
            "SELECT read_cnt, like_cnt, collect_cnt FROM interactions \
             WHERE biz = $1 AND biz_id = $2",
        )
        .bind(biz)
        .bind(biz_id)
        .fetch_optional(self.replicas.replica())
        .await?;

        Ok(row
            .map(|r| Counters {
                read_cnt: r.read_cnt,
                like_cnt: r.like_cnt,
                collect_cnt: r.collect_cnt,
            })
            .unwrap_or_default())
    }

    async fn is_liked(&self, biz: &str, biz_id: i64, uid: i64) -> CoreResult<bool> {
        self.membership_active("user_likes", biz, biz_id, uid).await
    }

    async fn is_collected(&self, biz: &str, biz_id: i64, uid: i64) -> CoreResult<bool> {
        self.membership_active("user_collections", biz, biz_id, uid)
            .await
    }

    async fn collection_list(&self, biz: &str, uid: i64) -> CoreResult<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT biz_id FROM user_collections \
             WHERE biz = $1 AND uid = $2 AND state = 1 ORDER BY id",
        )
        .bind(biz)
        .bind(uid)
        .fetch_all(self.replicas.replica())
        .await?;
        Ok(ids)
    }
}
