use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

/// Generic message for every verification failure. Callers never learn
/// whether the signature, the expiry, or the kind check failed.
pub const INVALID_TOKEN: &str = "Invalid or expired token";

/// Discriminator signed into every token.
///
/// Verification requires the expected kind to match, so a token minted for
/// one flow can never be replayed in another (a 2FA setup token is not a
/// challenge token, and neither is a session token).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    #[serde(rename = "USER")]
    User,
    #[serde(rename = "OAUTH_STATE")]
    OauthState,
    #[serde(rename = "2FA_SETUP")]
    TwofaSetup,
    #[serde(rename = "2FA_CHALLENGE")]
    TwofaChallenge,
}

/// JWT claims payload.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID); absent for anti-CSRF state tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<i32>,
    pub kind: TokenKind,
    /// Unique token id
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: usize,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Pending TOTP secret, carried by setup tokens only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// Sign a token of the given kind.
///
/// `secret_claim` binds a setup token to the pending TOTP secret it was
/// issued for; pass `None` for every other kind.
pub fn issue(
    kind: TokenKind,
    user_id: Option<i32>,
    secret_claim: Option<String>,
    signing_secret: &str,
    ttl_secs: i64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let expires = now + Duration::seconds(ttl_secs);

    let claims = Claims {
        sub: user_id,
        kind,
        jti: Uuid::new_v4().to_string(),
        iat: now.timestamp() as usize,
        exp: expires.timestamp() as usize,
        secret: secret_claim,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(signing_secret.as_bytes()),
    )
    .map_err(|e| AuthError::Internal(format!("Failed to sign token: {}", e)))
}

/// Verify a token and check it is of the expected kind.
///
/// Rejects malformed signatures, expired tokens, and well-formed tokens of
/// any other kind, all with the same generic error.
pub fn verify(
    token: &str,
    expected: TokenKind,
    signing_secret: &str,
) -> Result<Claims, AuthError> {
    let mut validation = Validation::default();
    validation.leeway = 0;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(signing_secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AuthError::Unauthorized(INVALID_TOKEN.to_string()))?;

    if data.claims.kind != expected {
        return Err(AuthError::Unauthorized(INVALID_TOKEN.to_string()));
    }

    Ok(data.claims)
}
