use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::controllers::AppState;
use crate::error::AuthError;

/// Extractor for authenticated routes. Pulls the bearer token from the
/// `Authorization` header and validates it against the session store,
/// which also refreshes the caller's presence.
pub struct AuthUser {
    pub user_id: i32,
    pub token: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AuthError::Unauthorized("Missing authorization header".to_string())
            })?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| {
                AuthError::Unauthorized("Invalid authorization header".to_string())
            })?
            .trim();

        let user_id = state.service.validate_token(token).await?;
        Ok(AuthUser {
            user_id,
            token: token.to_string(),
        })
    }
}
