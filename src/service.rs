use redis::aio::ConnectionManager;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::jwt::{self, TokenKind, INVALID_TOKEN};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::presence::{DbPresence, PresenceTracker, RedisPresence};
use crate::auth::session::{DbSessionStore, RedisSessionStore, SessionStore};
use crate::auth::totp::{generate_totp_secret, verify_totp};
use crate::auth::twofa::TwoFaState;
use crate::config::Config;
use crate::error::AuthError;
use crate::models::user::{self, SimpleUser, UserResponse};
use crate::oauth::{GoogleProvider, IdentityProvider};

/// Outcome of a password login: either a live session, or a 2FA challenge
/// the client must answer before any session exists.
#[derive(Debug)]
pub enum LoginOutcome {
    Session { token: String, user: UserResponse },
    TwoFaRequired { challenge_token: String },
}

/// Result of starting TOTP enrollment.
#[derive(Debug)]
pub struct TwoFaSetup {
    pub setup_token: String,
    pub secret: String,
    pub otpauth_uri: String,
}

/// Core authentication service. Holds the durable store and the
/// backend-selected session and presence strategies; every handler goes
/// through here.
#[derive(Clone)]
pub struct AuthService {
    db: DatabaseConnection,
    sessions: Arc<dyn SessionStore>,
    presence: Arc<dyn PresenceTracker>,
    provider: Arc<dyn IdentityProvider>,
    config: Arc<Config>,
}

impl AuthService {
    /// Build the service, selecting session and presence backends once.
    /// With a Redis connection both run on Redis; without one they fall
    /// back to the relational store. Nothing downstream branches on this.
    pub fn new(
        db: DatabaseConnection,
        redis: Option<ConnectionManager>,
        config: Config,
    ) -> Self {
        let (sessions, presence): (Arc<dyn SessionStore>, Arc<dyn PresenceTracker>) = match redis
        {
            Some(conn) => (
                Arc::new(RedisSessionStore::new(
                    conn.clone(),
                    config.jwt_secret.clone(),
                    config.session_ttl_secs,
                    config.session_absolute_ttl_secs,
                )),
                Arc::new(RedisPresence::new(conn, config.presence_window_secs)),
            ),
            None => (
                Arc::new(DbSessionStore::new(
                    db.clone(),
                    config.jwt_secret.clone(),
                    config.session_ttl_secs,
                )),
                Arc::new(DbPresence::new(db.clone(), config.presence_window_secs)),
            ),
        };

        let provider = Arc::new(GoogleProvider::from_config(&config));

        Self {
            db,
            sessions,
            presence,
            provider,
            config: Arc::new(config),
        }
    }

    /// Swap the identity provider, for tests that stub the federation
    /// boundary.
    pub fn with_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ------------------------------------------------------------------
    // Registration and login
    // ------------------------------------------------------------------

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        avatar: Option<String>,
    ) -> Result<UserResponse, AuthError> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Username, email and password are required".to_string(),
            ));
        }

        let taken = user::Entity::find()
            .filter(
                Condition::any()
                    .add(user::Column::Username.eq(username))
                    .add(user::Column::Email.eq(email)),
            )
            .one(&self.db)
            .await?;
        if taken.is_some() {
            return Err(AuthError::Conflict(
                "Username or email already exists".to_string(),
            ));
        }

        let now = chrono::Utc::now().naive_utc();
        let model = user::ActiveModel {
            username: Set(username.to_string()),
            email: Set(email.to_string()),
            password_hash: Set(Some(hash_password(password)?)),
            avatar: Set(avatar),
            totp_enabled: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let created = model.insert(&self.db).await?;

        tracing::info!(user_id = created.id, "registered new user");
        Ok(created.into())
    }

    /// Password login. The identifier routes by shape: anything containing
    /// `@` is looked up as an email, otherwise as a username. Unknown
    /// accounts, federated-only accounts and wrong passwords all fail with
    /// the same message.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<LoginOutcome, AuthError> {
        let bad_credentials =
            || AuthError::Unauthorized("Invalid username or password".to_string());

        let query = if identifier.contains('@') {
            user::Entity::find().filter(user::Column::Email.eq(identifier))
        } else {
            user::Entity::find().filter(user::Column::Username.eq(identifier))
        };
        let found = query.one(&self.db).await?.ok_or_else(bad_credentials)?;

        let hash = found.password_hash.as_deref().ok_or_else(bad_credentials)?;
        if !verify_password(password, hash)? {
            return Err(bad_credentials());
        }

        if found.twofa_state().is_enabled() {
            let challenge_token = jwt::issue(
                TokenKind::TwofaChallenge,
                Some(found.id),
                None,
                &self.config.jwt_secret,
                self.config.twofa_token_ttl_secs as i64,
            )?;
            return Ok(LoginOutcome::TwoFaRequired { challenge_token });
        }

        let token = self.issue_session(found.id, false).await?;
        Ok(LoginOutcome::Session {
            token,
            user: found.into(),
        })
    }

    /// Mint a session and record the heartbeat. Every session issue counts
    /// as activity, so this is the only path to the store's `issue`.
    async fn issue_session(
        &self,
        user_id: i32,
        revoke_existing: bool,
    ) -> Result<String, AuthError> {
        let token = self.sessions.issue(user_id, revoke_existing).await?;
        self.presence.touch(user_id);
        Ok(token)
    }

    /// Validate a bearer token and return the owning user id. Also marks
    /// the user as seen: every authenticated request doubles as a
    /// heartbeat.
    pub async fn validate_token(&self, token: &str) -> Result<i32, AuthError> {
        let claims = jwt::verify(token, TokenKind::User, &self.config.jwt_secret)?;
        let user_id = claims
            .sub
            .ok_or_else(|| AuthError::Unauthorized(INVALID_TOKEN.to_string()))?;

        self.sessions.validate(user_id, token).await?;
        self.presence.touch(user_id);
        Ok(user_id)
    }

    pub async fn logout(&self, user_id: i32) -> Result<(), AuthError> {
        self.sessions.revoke_all(user_id).await
    }

    // ------------------------------------------------------------------
    // Account management
    // ------------------------------------------------------------------

    pub async fn profile(&self, user_id: i32) -> Result<UserResponse, AuthError> {
        let found = self.find_user(user_id).await?;
        Ok(found.into())
    }

    pub async fn update_profile(
        &self,
        user_id: i32,
        username: Option<String>,
        email: Option<String>,
        avatar: Option<String>,
    ) -> Result<UserResponse, AuthError> {
        let found = self.find_user(user_id).await?;

        if let Some(name) = username.as_deref() {
            let clash = user::Entity::find()
                .filter(user::Column::Username.eq(name))
                .filter(user::Column::Id.ne(user_id))
                .one(&self.db)
                .await?;
            if clash.is_some() {
                return Err(AuthError::Conflict("Username already taken".to_string()));
            }
        }
        if let Some(addr) = email.as_deref() {
            let clash = user::Entity::find()
                .filter(user::Column::Email.eq(addr))
                .filter(user::Column::Id.ne(user_id))
                .one(&self.db)
                .await?;
            if clash.is_some() {
                return Err(AuthError::Conflict("Email already taken".to_string()));
            }
        }

        let mut active: user::ActiveModel = found.into();
        if let Some(name) = username {
            active.username = Set(name);
        }
        if let Some(addr) = email {
            active.email = Set(addr);
        }
        if let Some(url) = avatar {
            active.avatar = Set(Some(url));
        }
        active.updated_at = Set(chrono::Utc::now().naive_utc());
        let updated = active.update(&self.db).await?;
        Ok(updated.into())
    }

    /// Change the account password. All existing sessions are revoked and a
    /// fresh one is issued so the caller stays logged in.
    pub async fn change_password(
        &self,
        user_id: i32,
        old_password: &str,
        new_password: &str,
    ) -> Result<String, AuthError> {
        let found = self.find_user(user_id).await?;
        let hash = found.password_hash.as_deref().ok_or_else(|| {
            AuthError::BadRequest("Account has no password to change".to_string())
        })?;
        if !verify_password(old_password, hash)? {
            return Err(AuthError::Unauthorized("Incorrect password".to_string()));
        }
        if new_password.is_empty() {
            return Err(AuthError::Validation("New password is required".to_string()));
        }

        let mut active: user::ActiveModel = found.into();
        active.password_hash = Set(Some(hash_password(new_password)?));
        active.updated_at = Set(chrono::Utc::now().naive_utc());
        active.update(&self.db).await?;

        self.issue_session(user_id, true).await
    }

    pub async fn delete_account(&self, user_id: i32) -> Result<(), AuthError> {
        let found = self.find_user(user_id).await?;
        self.sessions.revoke_all(user_id).await?;
        user::Entity::delete_by_id(found.id).exec(&self.db).await?;
        tracing::info!(user_id, "deleted account");
        Ok(())
    }

    /// Every account, annotated with whether it was seen inside the
    /// presence window.
    pub async fn list_users(&self) -> Result<Vec<SimpleUser>, AuthError> {
        let online = self.presence.online_ids().await?;
        let users = user::Entity::find()
            .order_by_asc(user::Column::Id)
            .all(&self.db)
            .await?;

        Ok(users
            .into_iter()
            .map(|u| SimpleUser {
                online: online.contains(&u.id),
                id: u.id,
                username: u.username,
                avatar: u.avatar,
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Two-factor enrollment and challenge
    // ------------------------------------------------------------------

    /// Begin TOTP enrollment. Generates a fresh secret, parks it as
    /// pending, and returns a short-lived setup token bound to that exact
    /// secret. Restarting setup simply replaces the pending secret.
    pub async fn twofa_start_setup(&self, user_id: i32) -> Result<TwoFaSetup, AuthError> {
        let found = self.find_user(user_id).await?;
        if found.password_hash.is_none() {
            return Err(AuthError::BadRequest(
                "2FA is not available for federated accounts".to_string(),
            ));
        }
        if matches!(found.twofa_state(), TwoFaState::Enabled(_)) {
            return Err(AuthError::BadRequest("2FA is already enabled".to_string()));
        }

        let (secret, otpauth_uri) =
            generate_totp_secret(&self.config.totp_issuer, &found.username)?;

        let mut active: user::ActiveModel = found.into();
        active.totp_secret = Set(Some(secret.clone()));
        active.totp_enabled = Set(false);
        active.updated_at = Set(chrono::Utc::now().naive_utc());
        active.update(&self.db).await?;

        let setup_token = jwt::issue(
            TokenKind::TwofaSetup,
            Some(user_id),
            Some(secret.clone()),
            &self.config.jwt_secret,
            self.config.twofa_token_ttl_secs as i64,
        )?;

        Ok(TwoFaSetup {
            setup_token,
            secret,
            otpauth_uri,
        })
    }

    /// Confirm enrollment with a code from the authenticator. The setup
    /// token must carry the secret that is still pending; a stale token
    /// from an earlier setup attempt no longer matches and is rejected.
    /// Enabling 2FA revokes all sessions and issues a fresh one.
    pub async fn twofa_confirm(
        &self,
        user_id: i32,
        setup_token: &str,
        code: &str,
    ) -> Result<String, AuthError> {
        let claims = jwt::verify(setup_token, TokenKind::TwofaSetup, &self.config.jwt_secret)
            .map_err(|_| AuthError::BadRequest("Invalid setup token".to_string()))?;
        if claims.sub != Some(user_id) {
            return Err(AuthError::BadRequest("Invalid setup token".to_string()));
        }

        let found = self.find_user(user_id).await?;
        let pending = match found.twofa_state() {
            TwoFaState::Disabled => {
                return Err(AuthError::BadRequest("2FA setup not started".to_string()))
            }
            TwoFaState::Enabled(_) => {
                return Err(AuthError::BadRequest("2FA is already enabled".to_string()))
            }
            TwoFaState::Pending(secret) => secret,
        };
        if claims.secret.as_deref() != Some(pending.as_str()) {
            return Err(AuthError::BadRequest("Invalid setup token".to_string()));
        }

        if !verify_totp(&pending, code)? {
            return Err(AuthError::Unauthorized("Invalid 2FA code".to_string()));
        }

        let mut active: user::ActiveModel = found.into();
        active.totp_enabled = Set(true);
        active.updated_at = Set(chrono::Utc::now().naive_utc());
        active.update(&self.db).await?;

        tracing::info!(user_id, "2FA enabled");
        self.issue_session(user_id, true).await
    }

    /// Answer the post-login 2FA challenge and receive a session.
    pub async fn twofa_challenge(
        &self,
        challenge_token: &str,
        code: &str,
    ) -> Result<(String, UserResponse), AuthError> {
        let claims = jwt::verify(
            challenge_token,
            TokenKind::TwofaChallenge,
            &self.config.jwt_secret,
        )?;
        let user_id = claims
            .sub
            .ok_or_else(|| AuthError::Unauthorized(INVALID_TOKEN.to_string()))?;

        let found = self.find_user(user_id).await?;
        let secret = match found.twofa_state() {
            TwoFaState::Enabled(secret) => secret,
            _ => return Err(AuthError::BadRequest("2FA is not enabled".to_string())),
        };

        if !verify_totp(&secret, code)? {
            return Err(AuthError::Unauthorized("Invalid 2FA code".to_string()));
        }

        let token = self.issue_session(user_id, false).await?;
        Ok((token, found.into()))
    }

    /// Turn 2FA off. Requires the account password; revokes every session
    /// and hands back a fresh one.
    pub async fn twofa_disable(
        &self,
        user_id: i32,
        password: &str,
    ) -> Result<String, AuthError> {
        let found = self.find_user(user_id).await?;
        let hash = found.password_hash.as_deref().ok_or_else(|| {
            AuthError::BadRequest("2FA is not available for federated accounts".to_string())
        })?;
        if !matches!(found.twofa_state(), TwoFaState::Enabled(_)) {
            return Err(AuthError::BadRequest("2FA is not enabled".to_string()));
        }
        if !verify_password(password, hash)? {
            return Err(AuthError::Unauthorized("Incorrect password".to_string()));
        }

        let mut active: user::ActiveModel = found.into();
        active.totp_secret = Set(None);
        active.totp_enabled = Set(false);
        active.updated_at = Set(chrono::Utc::now().naive_utc());
        active.update(&self.db).await?;

        tracing::info!(user_id, "2FA disabled");
        self.issue_session(user_id, true).await
    }

    // ------------------------------------------------------------------
    // Federated login
    // ------------------------------------------------------------------

    /// Build the provider authorization URL carrying a signed state token.
    pub fn federated_auth_url(&self) -> Result<String, AuthError> {
        let state = jwt::issue(
            TokenKind::OauthState,
            None,
            None,
            &self.config.jwt_secret,
            self.config.oauth_state_ttl_secs as i64,
        )?;
        Ok(self.provider.auth_url(&state))
    }

    /// Complete the federated callback. An existing federated account logs
    /// in; a matching local email is refused rather than silently linked;
    /// otherwise a new account is provisioned.
    pub async fn federated_login(
        &self,
        code: &str,
        state: &str,
    ) -> Result<(String, UserResponse), AuthError> {
        jwt::verify(state, TokenKind::OauthState, &self.config.jwt_secret)?;

        let identity = self.provider.exchange(code).await?;

        if let Some(existing) = user::Entity::find()
            .filter(user::Column::OauthId.eq(identity.id.as_str()))
            .one(&self.db)
            .await?
        {
            let token = self.issue_session(existing.id, false).await?;
            return Ok((token, existing.into()));
        }

        if !identity.email.is_empty() {
            let local = user::Entity::find()
                .filter(user::Column::Email.eq(identity.email.as_str()))
                .one(&self.db)
                .await?;
            if local.is_some() {
                // Refuse to link a federated identity to a password account;
                // the user must log in with their password instead.
                return Err(AuthError::Conflict(
                    "An account with this email already exists".to_string(),
                ));
            }
        }

        let created = self.provision_federated(&identity).await?;
        let token = self.issue_session(created.id, false).await?;
        Ok((token, created.into()))
    }

    async fn provision_federated(
        &self,
        identity: &crate::oauth::ExternalIdentity,
    ) -> Result<user::Model, AuthError> {
        let prefix: String = identity.id.chars().take(8).collect();
        let mut username = format!("g_{}", prefix);

        // Retry with a random suffix if the derived name is taken.
        for _ in 0..3 {
            let clash = user::Entity::find()
                .filter(user::Column::Username.eq(username.as_str()))
                .one(&self.db)
                .await?;
            if clash.is_none() {
                break;
            }
            let suffix: String = Uuid::new_v4().simple().to_string().chars().take(6).collect();
            username = format!("g_{}_{}", prefix, suffix);
        }

        let now = chrono::Utc::now().naive_utc();
        let model = user::ActiveModel {
            username: Set(username),
            email: Set(identity.email.clone()),
            password_hash: Set(None),
            oauth_id: Set(Some(identity.id.clone())),
            avatar: Set(identity.picture.clone()),
            totp_enabled: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let created = model.insert(&self.db).await?;
        tracing::info!(user_id = created.id, "provisioned federated account");
        Ok(created)
    }

    async fn find_user(&self, user_id: i32) -> Result<user::Model, AuthError> {
        user::Entity::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".to_string()))
    }
}
