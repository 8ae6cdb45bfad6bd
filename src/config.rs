use serde::Deserialize;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database connection URL (e.g. sqlite://warden.db, postgres://...)
    pub database_url: String,

    /// Redis URL (e.g. redis://127.0.0.1:6379). When set, sessions and
    /// presence use the redis-backed stores; when absent, the durable
    /// database stores are used.
    pub redis_url: Option<String>,

    /// JWT signing secret (required)
    pub jwt_secret: String,

    /// Session token lifetime in seconds (default: 3600).
    ///
    /// For the redis backend this is the sliding window, refreshed on
    /// every successful validation.
    pub session_ttl_secs: u64,

    /// Absolute session lifetime cap in seconds (default: 30 days).
    ///
    /// Only meaningful for the redis backend, where the signed claim
    /// carries this cap so a continuously refreshed token still expires.
    pub session_absolute_ttl_secs: u64,

    /// Lifetime of 2FA setup and challenge tokens in seconds (default: 600)
    pub twofa_token_ttl_secs: u64,

    /// Lifetime of OAuth anti-CSRF state tokens in seconds (default: 600)
    pub oauth_state_ttl_secs: u64,

    /// Presence window in seconds: a user is "online" if seen within it
    /// (default: 120)
    pub presence_window_secs: u64,

    /// Rate limiter window in seconds (default: 60)
    pub rate_limit_window_secs: u64,

    /// Max requests per client per window (default: 1000)
    pub rate_limit_max_requests: u32,

    /// Interval between lazy sweeps of expired rate limit entries
    /// (default: 300)
    pub rate_limit_cleanup_secs: u64,

    /// Issuer label embedded in otpauth:// URIs (default: "Warden")
    pub totp_issuer: String,

    /// OAuth provider client id / secret / redirect (empty unless the
    /// federation routes are in use)
    pub oauth_client_id: String,
    pub oauth_client_secret: String,
    pub oauth_redirect_uri: String,

    /// Frontend base URL for the OAuth callback redirect
    pub frontend_url: String,

    /// Server host (default: 127.0.0.1)
    pub server_host: String,

    /// Server port (default: 3000)
    pub server_port: u16,

    /// Environment: development, production, test
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables (with .env support).
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        // Load .env file if present (ignore errors if missing)
        let _ = dotenvy::dotenv();

        let jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| "environment variable JWT_SECRET is required but not set")?;

        Ok(Config {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://warden.db?mode=rwc".to_string()),
            redis_url: std::env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
            jwt_secret,
            session_ttl_secs: env_u64("SESSION_TTL_SECS", 3600),
            session_absolute_ttl_secs: env_u64("SESSION_ABSOLUTE_TTL_SECS", 2_592_000),
            twofa_token_ttl_secs: env_u64("TWOFA_TOKEN_TTL_SECS", 600),
            oauth_state_ttl_secs: env_u64("OAUTH_STATE_TTL_SECS", 600),
            presence_window_secs: env_u64("PRESENCE_WINDOW_SECS", 120),
            rate_limit_window_secs: env_u64("RATE_LIMIT_WINDOW_SECS", 60),
            rate_limit_max_requests: std::env::var("RATE_LIMIT_MAX_REQUESTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
            rate_limit_cleanup_secs: env_u64("RATE_LIMIT_CLEANUP_SECS", 300),
            totp_issuer: std::env::var("TOTP_ISSUER").unwrap_or_else(|_| "Warden".to_string()),
            oauth_client_id: std::env::var("OAUTH_CLIENT_ID").unwrap_or_default(),
            oauth_client_secret: std::env::var("OAUTH_CLIENT_SECRET").unwrap_or_default(),
            oauth_redirect_uri: std::env::var("OAUTH_REDIRECT_URI").unwrap_or_default(),
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            server_host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        })
    }

    /// Check if running in development mode.
    pub fn is_dev(&self) -> bool {
        self.environment == "development"
    }

    /// Check if the redis-backed session/presence stores are active.
    pub fn redis_enabled(&self) -> bool {
        self.redis_url.is_some()
    }

    /// Get the full server address.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
