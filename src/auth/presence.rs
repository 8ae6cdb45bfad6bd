use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::collections::HashSet;
use std::time::Duration;

use crate::error::AuthError;
use crate::models::heartbeat;

/// Sorted-set key holding every user's last-seen timestamp as its score.
const PRESENCE_KEY: &str = "presence";

/// Heartbeat writes are detached from the request; bound them so they
/// cannot pile up behind a slow backend.
const TOUCH_TIMEOUT: Duration = Duration::from_secs(2);

/// Derives "who is online" from recent activity; no dedicated presence
/// protocol. Backend choice mirrors the session store's.
#[async_trait]
pub trait PresenceTracker: Send + Sync {
    /// Record activity for the user. Fire-and-forget: dispatched as a
    /// detached task, never blocks or fails the caller's request. Errors
    /// are logged only.
    fn touch(&self, user_id: i32);

    /// Users seen within the presence window.
    async fn online_ids(&self) -> Result<HashSet<i32>, AuthError>;
}

// ── Durable (database-backed) strategy ──

pub struct DbPresence {
    db: DatabaseConnection,
    window_secs: u64,
}

impl DbPresence {
    pub fn new(db: DatabaseConnection, window_secs: u64) -> Self {
        Self { db, window_secs }
    }
}

#[async_trait]
impl PresenceTracker for DbPresence {
    fn touch(&self, user_id: i32) {
        let db = self.db.clone();

        tokio::spawn(async move {
            let write = heartbeat::Entity::insert(heartbeat::ActiveModel {
                user_id: Set(user_id),
                last_seen_at: Set(Utc::now().naive_utc()),
            })
            .on_conflict(
                OnConflict::column(heartbeat::Column::UserId)
                    .update_column(heartbeat::Column::LastSeenAt)
                    .to_owned(),
            )
            .exec(&db);

            match tokio::time::timeout(TOUCH_TIMEOUT, write).await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => tracing::warn!(user_id, %err, "heartbeat write failed"),
                Err(_) => tracing::warn!(user_id, "heartbeat write timed out"),
            }
        });
    }

    async fn online_ids(&self) -> Result<HashSet<i32>, AuthError> {
        let cutoff = Utc::now().naive_utc() - ChronoDuration::seconds(self.window_secs as i64);

        let rows = heartbeat::Entity::find()
            .filter(heartbeat::Column::LastSeenAt.gt(cutoff))
            .all(&self.db)
            .await?;

        Ok(rows.into_iter().map(|hb| hb.user_id).collect())
    }
}

// ── Cache (redis-backed) strategy ──

/// Presence lives in one sorted set scored by unix seconds. Reads query by
/// score range and opportunistically prune entries older than the window;
/// there is no scheduled cleanup job.
pub struct RedisPresence {
    conn: ConnectionManager,
    window_secs: u64,
}

impl RedisPresence {
    pub fn new(conn: ConnectionManager, window_secs: u64) -> Self {
        Self { conn, window_secs }
    }

    fn prune_expired(&self, cutoff: i64) {
        let mut conn = self.conn.clone();

        tokio::spawn(async move {
            let prune = conn.zrembyscore::<_, _, _, ()>(PRESENCE_KEY, "-inf", cutoff);
            match tokio::time::timeout(TOUCH_TIMEOUT, prune).await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => tracing::warn!(%err, "presence prune failed"),
                Err(_) => tracing::warn!("presence prune timed out"),
            }
        });
    }
}

#[async_trait]
impl PresenceTracker for RedisPresence {
    fn touch(&self, user_id: i32) {
        let mut conn = self.conn.clone();

        tokio::spawn(async move {
            let write =
                conn.zadd::<_, _, _, ()>(PRESENCE_KEY, user_id, Utc::now().timestamp());

            match tokio::time::timeout(TOUCH_TIMEOUT, write).await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => tracing::warn!(user_id, %err, "heartbeat write failed"),
                Err(_) => tracing::warn!(user_id, "heartbeat write timed out"),
            }
        });
    }

    async fn online_ids(&self) -> Result<HashSet<i32>, AuthError> {
        let cutoff = (Utc::now() - ChronoDuration::seconds(self.window_secs as i64)).timestamp();

        let mut conn = self.conn.clone();
        let ids: Vec<i32> = tokio::time::timeout(
            TOUCH_TIMEOUT,
            conn.zrangebyscore(PRESENCE_KEY, cutoff, "+inf"),
        )
        .await
        .map_err(|_| AuthError::Internal("Redis operation timed out".to_string()))??;

        self.prune_expired(cutoff);

        Ok(ids.into_iter().collect())
    }
}
