use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AuthError;
use crate::extractors::AuthUser;
use crate::models::user::{SimpleUser, UserResponse};
use crate::response::ApiResponse;
use crate::service::LoginOutcome;

use super::AppState;

// ── Request / Response types ──

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Username or email address
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub twofa_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Short-lived token to present with the 2FA code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResponse>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TwoFaChallengeRequest {
    pub challenge_token: String,
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TwoFaSetupResponse {
    /// Present with the confirmation code to finish enrollment
    pub setup_token: String,
    /// Base32-encoded TOTP secret
    pub secret: String,
    /// otpauth:// URI for QR code generation
    pub otpauth_uri: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TwoFaConfirmRequest {
    pub setup_token: String,
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TwoFaDisableRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct OauthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

// ── Routes ──

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(register).get(list_users))
        .route("/login", post(login))
        .route("/2fa", post(twofa_challenge))
        .route("/2fa/setup", post(twofa_setup))
        .route("/2fa/confirm", post(twofa_confirm))
        .route("/2fa/disable", put(twofa_disable))
        .route("/me", get(me).put(update_profile).delete(delete_account))
        .route("/password", put(change_password))
        .route("/logout", delete(logout))
        .route("/google/login", get(google_login))
        .route("/google/callback", get(google_callback))
}

// ── Handlers ──

/// Register a new account.
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created", body = ApiResponse<UserResponse>),
        (status = 409, description = "Username or email already exists")
    ),
    tag = "users"
)]
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<ApiResponse<UserResponse>, AuthError> {
    let user = state
        .service
        .register(
            &payload.username,
            &payload.email,
            &payload.password,
            payload.avatar,
        )
        .await?;
    Ok(ApiResponse::success(user))
}

/// Log in with a username or email and password.
#[utoipa::path(
    post,
    path = "/api/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session token or 2FA challenge", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "users"
)]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>, AuthError> {
    let outcome = state
        .service
        .login(&payload.identifier, &payload.password)
        .await?;

    let body = match outcome {
        LoginOutcome::Session { token, user } => LoginResponse {
            twofa_required: false,
            token: Some(token),
            challenge_token: None,
            user: Some(user),
        },
        LoginOutcome::TwoFaRequired { challenge_token } => LoginResponse {
            twofa_required: true,
            token: None,
            challenge_token: Some(challenge_token),
            user: None,
        },
    };
    Ok(ApiResponse::success(body))
}

/// Answer the 2FA challenge issued at login.
#[utoipa::path(
    post,
    path = "/api/users/2fa",
    request_body = TwoFaChallengeRequest,
    responses(
        (status = 200, description = "Session token", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid code or challenge token")
    ),
    tag = "users"
)]
async fn twofa_challenge(
    State(state): State<AppState>,
    Json(payload): Json<TwoFaChallengeRequest>,
) -> Result<ApiResponse<LoginResponse>, AuthError> {
    let (token, user) = state
        .service
        .twofa_challenge(&payload.challenge_token, &payload.code)
        .await?;
    Ok(ApiResponse::success(LoginResponse {
        twofa_required: false,
        token: Some(token),
        challenge_token: None,
        user: Some(user),
    }))
}

/// Current user's profile.
#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Profile", body = ApiResponse<UserResponse>),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<ApiResponse<UserResponse>, AuthError> {
    let user = state.service.profile(auth.user_id).await?;
    Ok(ApiResponse::success(user))
}

/// Update the current user's profile.
#[utoipa::path(
    put,
    path = "/api/users/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = ApiResponse<UserResponse>),
        (status = 409, description = "Username or email taken")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<ApiResponse<UserResponse>, AuthError> {
    let user = state
        .service
        .update_profile(auth.user_id, payload.username, payload.email, payload.avatar)
        .await?;
    Ok(ApiResponse::success(user))
}

/// Change the account password. Revokes other sessions and returns a
/// fresh token.
#[utoipa::path(
    put,
    path = "/api/users/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "New session token", body = ApiResponse<TokenResponse>),
        (status = 401, description = "Incorrect password")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<ApiResponse<TokenResponse>, AuthError> {
    let token = state
        .service
        .change_password(auth.user_id, &payload.old_password, &payload.new_password)
        .await?;
    Ok(ApiResponse::success(TokenResponse { token }))
}

/// Log out, revoking every session for the account.
#[utoipa::path(
    delete,
    path = "/api/users/logout",
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<ApiResponse<()>, AuthError> {
    state.service.logout(auth.user_id).await?;
    Ok(ApiResponse::success(()))
}

/// Delete the current account and all of its sessions.
#[utoipa::path(
    delete,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Account deleted"),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
async fn delete_account(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<ApiResponse<()>, AuthError> {
    state.service.delete_account(auth.user_id).await?;
    Ok(ApiResponse::success(()))
}

/// List all users with their online status.
#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "Users", body = ApiResponse<Vec<SimpleUser>>),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
async fn list_users(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<ApiResponse<Vec<SimpleUser>>, AuthError> {
    let users = state.service.list_users().await?;
    Ok(ApiResponse::success(users))
}

/// Begin TOTP enrollment.
#[utoipa::path(
    post,
    path = "/api/users/2fa/setup",
    responses(
        (status = 200, description = "Pending secret and setup token", body = ApiResponse<TwoFaSetupResponse>),
        (status = 400, description = "Already enabled or federated account")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
async fn twofa_setup(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<ApiResponse<TwoFaSetupResponse>, AuthError> {
    let setup = state.service.twofa_start_setup(auth.user_id).await?;
    Ok(ApiResponse::success(TwoFaSetupResponse {
        setup_token: setup.setup_token,
        secret: setup.secret,
        otpauth_uri: setup.otpauth_uri,
    }))
}

/// Confirm TOTP enrollment with a code from the authenticator.
#[utoipa::path(
    post,
    path = "/api/users/2fa/confirm",
    request_body = TwoFaConfirmRequest,
    responses(
        (status = 200, description = "2FA enabled, new session token", body = ApiResponse<TokenResponse>),
        (status = 400, description = "Invalid or stale setup token"),
        (status = 401, description = "Invalid 2FA code")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
async fn twofa_confirm(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<TwoFaConfirmRequest>,
) -> Result<ApiResponse<TokenResponse>, AuthError> {
    let token = state
        .service
        .twofa_confirm(auth.user_id, &payload.setup_token, &payload.code)
        .await?;
    Ok(ApiResponse::success(TokenResponse { token }))
}

/// Disable 2FA, confirmed with the account password.
#[utoipa::path(
    put,
    path = "/api/users/2fa/disable",
    request_body = TwoFaDisableRequest,
    responses(
        (status = 200, description = "2FA disabled, new session token", body = ApiResponse<TokenResponse>),
        (status = 400, description = "2FA not enabled"),
        (status = 401, description = "Incorrect password")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
async fn twofa_disable(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<TwoFaDisableRequest>,
) -> Result<ApiResponse<TokenResponse>, AuthError> {
    let token = state
        .service
        .twofa_disable(auth.user_id, &payload.password)
        .await?;
    Ok(ApiResponse::success(TokenResponse { token }))
}

/// Redirect to the external provider's consent screen.
#[utoipa::path(
    get,
    path = "/api/users/google/login",
    responses((status = 307, description = "Redirect to provider")),
    tag = "users"
)]
async fn google_login(State(state): State<AppState>) -> Result<Redirect, AuthError> {
    let url = state.service.federated_auth_url()?;
    Ok(Redirect::temporary(&url))
}

/// Provider callback. On success redirects to the frontend with the
/// session token in the query string; on failure with an error message.
#[utoipa::path(
    get,
    path = "/api/users/google/callback",
    responses((status = 307, description = "Redirect to frontend")),
    tag = "users"
)]
async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<OauthCallbackQuery>,
) -> Redirect {
    let frontend = &state.config.frontend_url;

    let (code, oauth_state) = match (query.code, query.state) {
        (Some(c), Some(s)) => (c, s),
        _ => {
            return Redirect::temporary(&format!(
                "{}/login?error=missing_code_or_state",
                frontend
            ))
        }
    };

    match state.service.federated_login(&code, &oauth_state).await {
        Ok((token, _user)) => Redirect::temporary(&format!("{}/login?token={}", frontend, token)),
        Err(err) => {
            tracing::warn!(error = %err, "federated login failed");
            let reason = match err {
                AuthError::Conflict(_) => "email_already_registered",
                AuthError::Unauthorized(_) => "invalid_state",
                _ => "oauth_failed",
            };
            Redirect::temporary(&format!("{}/login?error={}", frontend, reason))
        }
    }
}
