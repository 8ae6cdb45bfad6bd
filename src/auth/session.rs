use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::time::Duration;

use crate::auth::jwt::{self, TokenKind, INVALID_TOKEN};
use crate::error::AuthError;
use crate::models::session_token;

/// Bound on individual store calls so a stalled backend cannot wedge
/// request tasks.
const STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// The token lifecycle contract both persistence strategies satisfy.
///
/// The orchestrator holds `Arc<dyn SessionStore>` and never branches on
/// which backend is active; the choice is made once at construction.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Mint and persist a new session token for the user.
    ///
    /// With `revoke_existing`, every other token the user holds dies first
    /// (password change, 2FA confirm/disable).
    async fn issue(&self, user_id: i32, revoke_existing: bool) -> Result<String, AuthError>;

    /// Check that the token exists and belongs to the claimed user.
    ///
    /// Absence and ownership mismatch surface the same generic error.
    async fn validate(&self, user_id: i32, token: &str) -> Result<(), AuthError>;

    /// Drop every token the user holds. Idempotent.
    async fn revoke_all(&self, user_id: i32) -> Result<(), AuthError>;
}

// ── Durable (database-backed) strategy ──

/// Tokens are rows keyed by the signed token string with an owning-user
/// foreign key. Expiry is enforced by the token's own signed claim, which
/// the caller verifies before consulting the store.
pub struct DbSessionStore {
    db: DatabaseConnection,
    jwt_secret: String,
    session_ttl_secs: u64,
}

impl DbSessionStore {
    pub fn new(db: DatabaseConnection, jwt_secret: String, session_ttl_secs: u64) -> Self {
        Self {
            db,
            jwt_secret,
            session_ttl_secs,
        }
    }
}

#[async_trait]
impl SessionStore for DbSessionStore {
    async fn issue(&self, user_id: i32, revoke_existing: bool) -> Result<String, AuthError> {
        if revoke_existing {
            self.revoke_all(user_id).await?;
        }

        let token = jwt::issue(
            TokenKind::User,
            Some(user_id),
            None,
            &self.jwt_secret,
            self.session_ttl_secs as i64,
        )?;

        session_token::ActiveModel {
            user_id: Set(user_id),
            token: Set(token.clone()),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        Ok(token)
    }

    async fn validate(&self, user_id: i32, token: &str) -> Result<(), AuthError> {
        let row = session_token::Entity::find()
            .filter(session_token::Column::Token.eq(token))
            .one(&self.db)
            .await?
            .ok_or_else(|| AuthError::Unauthorized(INVALID_TOKEN.to_string()))?;

        if row.user_id != user_id {
            tracing::debug!(user_id, owner = row.user_id, "token owner mismatch");
            return Err(AuthError::Unauthorized(INVALID_TOKEN.to_string()));
        }

        Ok(())
    }

    async fn revoke_all(&self, user_id: i32) -> Result<(), AuthError> {
        session_token::Entity::delete_many()
            .filter(session_token::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;

        Ok(())
    }
}

// ── Cache (redis-backed) strategy ──

/// Tokens are keys under `session:<user-id>:<token>` with a store-managed
/// TTL. The store TTL is the sliding window, refreshed on every successful
/// validation; the signed claim carries the absolute cap, so a token in
/// continuous use still expires eventually.
pub struct RedisSessionStore {
    conn: ConnectionManager,
    jwt_secret: String,
    sliding_ttl_secs: u64,
    absolute_ttl_secs: u64,
}

impl RedisSessionStore {
    pub fn new(
        conn: ConnectionManager,
        jwt_secret: String,
        sliding_ttl_secs: u64,
        absolute_ttl_secs: u64,
    ) -> Self {
        Self {
            conn,
            jwt_secret,
            sliding_ttl_secs,
            absolute_ttl_secs,
        }
    }

    async fn delete_matching(&self, pattern: String) -> Result<(), AuthError> {
        let mut conn = self.conn.clone();

        let op = async move {
            let keys: Vec<String> = {
                let mut iter = conn.scan_match::<&str, String>(pattern.as_str()).await?;
                let mut keys = Vec::new();
                while let Some(key) = iter.next_item().await {
                    keys.push(key);
                }
                keys
            };

            if !keys.is_empty() {
                let _: () = conn.del(keys).await?;
            }

            Ok::<(), redis::RedisError>(())
        };

        tokio::time::timeout(STORE_TIMEOUT, op)
            .await
            .map_err(|_| AuthError::Internal("Redis operation timed out".to_string()))??;

        Ok(())
    }
}

fn session_key(user_id: i32, token: &str) -> String {
    format!("session:{}:{}", user_id, token)
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn issue(&self, user_id: i32, revoke_existing: bool) -> Result<String, AuthError> {
        if revoke_existing {
            self.delete_matching(session_key(user_id, "*")).await?;
        }

        // The claim carries the absolute cap; the key TTL is the sliding
        // window that actually governs liveness.
        let token = jwt::issue(
            TokenKind::User,
            Some(user_id),
            None,
            &self.jwt_secret,
            self.absolute_ttl_secs as i64,
        )?;

        let mut conn = self.conn.clone();
        let key = session_key(user_id, &token);
        tokio::time::timeout(
            STORE_TIMEOUT,
            conn.set_ex::<_, _, ()>(key, "", self.sliding_ttl_secs),
        )
        .await
        .map_err(|_| AuthError::Internal("Redis operation timed out".to_string()))??;

        Ok(token)
    }

    async fn validate(&self, user_id: i32, token: &str) -> Result<(), AuthError> {
        let mut conn = self.conn.clone();
        let key = session_key(user_id, token);

        let found: Option<String> =
            tokio::time::timeout(STORE_TIMEOUT, conn.get::<_, Option<String>>(&key))
                .await
                .map_err(|_| AuthError::Internal("Redis operation timed out".to_string()))??;

        if found.is_none() {
            return Err(AuthError::Unauthorized(INVALID_TOKEN.to_string()));
        }

        // Slide the window forward on use.
        let _: bool = tokio::time::timeout(
            STORE_TIMEOUT,
            conn.expire::<_, bool>(&key, self.sliding_ttl_secs as i64),
        )
        .await
        .map_err(|_| AuthError::Internal("Redis operation timed out".to_string()))??;

        Ok(())
    }

    async fn revoke_all(&self, user_id: i32) -> Result<(), AuthError> {
        self.delete_matching(session_key(user_id, "*")).await
    }
}
