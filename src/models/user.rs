use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// User entity — the principal every token and heartbeat belongs to.
///
/// `password_hash` is null for federated-only accounts (no local password).
/// The 2FA columns encode a tri-state: see [`crate::auth::twofa::TwoFaState`].
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,

    #[sea_orm(unique)]
    pub email: String,

    /// Password hash (excluded from serialization via serde skip)
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    /// External identity provider subject id (unique when present)
    #[sea_orm(unique)]
    pub oauth_id: Option<String>,

    pub avatar: Option<String>,

    /// TOTP secret, base32. Pending until `totp_enabled` is set.
    #[serde(skip_serializing)]
    pub totp_secret: Option<String>,

    pub totp_enabled: bool,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Public user data (safe to return in API responses).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub twofa_enabled: bool,
    pub oauth_linked: bool,
    pub created_at: NaiveDateTime,
}

impl From<Model> for UserResponse {
    fn from(user: Model) -> Self {
        UserResponse {
            id: user.id,
            username: user.username,
            email: user.email,
            avatar: user.avatar,
            // Pending secrets do not count as enabled
            twofa_enabled: user.totp_enabled,
            oauth_linked: user.oauth_id.is_some(),
            created_at: user.created_at,
        }
    }
}

/// Minimal user info plus derived presence, for listings.
#[derive(Debug, Serialize, ToSchema)]
pub struct SimpleUser {
    pub id: i32,
    pub username: String,
    pub avatar: Option<String>,
    pub online: bool,
}
