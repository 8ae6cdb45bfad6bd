//! Helpers for integration tests: an in-memory database with migrations
//! applied, a config with short TTLs, and a wired service.

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;

use crate::config::Config;
use crate::migrations::Migrator;
use crate::oauth::IdentityProvider;
use crate::service::AuthService;

/// In-memory SQLite database with all migrations applied. A single
/// connection keeps the in-memory database alive for the pool's lifetime.
pub async fn test_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:".to_string());
    opts.max_connections(1).sqlx_logging(false);
    let db = Database::connect(opts)
        .await
        .expect("failed to open in-memory database");
    Migrator::up(&db, None).await.expect("migrations failed");
    db
}

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        redis_url: None,
        jwt_secret: "test-secret-key-for-testing".to_string(),
        session_ttl_secs: 3600,
        session_absolute_ttl_secs: 86400,
        twofa_token_ttl_secs: 600,
        oauth_state_ttl_secs: 600,
        presence_window_secs: 120,
        rate_limit_window_secs: 60,
        rate_limit_max_requests: 1000,
        rate_limit_cleanup_secs: 300,
        totp_issuer: "WardenTest".to_string(),
        oauth_client_id: String::new(),
        oauth_client_secret: String::new(),
        oauth_redirect_uri: String::new(),
        frontend_url: "http://localhost:3000".to_string(),
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        environment: "test".to_string(),
    }
}

/// Service on the database backend with the default config.
pub async fn test_service() -> AuthService {
    let db = test_db().await;
    AuthService::new(db, None, test_config())
}

/// Service on the database backend with a caller-tuned config.
pub async fn test_service_with(config: Config) -> AuthService {
    let db = test_db().await;
    AuthService::new(db, None, config)
}

/// Service with a stubbed identity provider, for federated login tests.
pub async fn test_service_with_provider(provider: Arc<dyn IdentityProvider>) -> AuthService {
    let db = test_db().await;
    AuthService::new(db, None, test_config()).with_provider(provider)
}
