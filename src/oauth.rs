use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::Config;
use crate::error::AuthError;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

/// Verified identity returned by the external provider.
#[derive(Debug, Clone)]
pub struct ExternalIdentity {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Boundary to the external identity provider. The federation handshake is
/// opaque to the rest of the service: it either yields a verified identity
/// or an error.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange an authorization code for a verified identity.
    async fn exchange(&self, code: &str) -> Result<ExternalIdentity, AuthError>;

    /// Build the provider's authorization URL carrying the signed
    /// anti-CSRF state token.
    fn auth_url(&self, state: &str) -> String;
}

/// Google OAuth2 implementation of the provider boundary.
pub struct GoogleProvider {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: String,
    name: Option<String>,
    picture: Option<String>,
}

impl GoogleProvider {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client_id: config.oauth_client_id.clone(),
            client_secret: config.oauth_client_secret.clone(),
            redirect_uri: config.oauth_redirect_uri.clone(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .expect("failed to build http client"),
        }
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    async fn exchange(&self, code: &str) -> Result<ExternalIdentity, AuthError> {
        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let resp = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Internal(format!("OAuth token exchange failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(AuthError::Unauthorized(
                "Failed to exchange authorization code".to_string(),
            ));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Internal(format!("OAuth token response malformed: {}", e)))?;

        let info: UserInfo = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| AuthError::Internal(format!("OAuth userinfo fetch failed: {}", e)))?
            .json()
            .await
            .map_err(|e| AuthError::Internal(format!("OAuth userinfo malformed: {}", e)))?;

        if info.sub.is_empty() {
            return Err(AuthError::Unauthorized(
                "Provider identity missing subject".to_string(),
            ));
        }

        Ok(ExternalIdentity {
            id: info.sub,
            email: info.email,
            name: info.name,
            picture: info.picture,
        })
    }

    fn auth_url(&self, state: &str) -> String {
        let mut url = reqwest::Url::parse(GOOGLE_AUTH_URL).expect("static URL is valid");
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", "openid email profile")
            .append_pair("state", state);
        url.to_string()
    }
}
