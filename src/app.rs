use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use redis::aio::ConnectionManager;
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::auth::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::config::Config;
use crate::controllers::{self, AppState};
use crate::migrations::Migrator;
use crate::openapi::ApiDoc;
use crate::service::AuthService;

/// The Warden application: owns the durable store, the optional cache
/// connection, and the wired service.
pub struct App {
    pub config: Config,
    pub db: DatabaseConnection,
    pub redis: Option<ConnectionManager>,
    pub service: AuthService,
}

impl App {
    pub async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::from_env()?;
        Self::with_config(config).await
    }

    pub async fn with_config(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let db = crate::db::connect(&config).await?;

        tracing::info!("Running pending database migrations...");
        Migrator::up(&db, None).await?;
        tracing::info!("Migrations complete.");

        // Connect the cache if configured; session and presence backends
        // are selected once here and never re-examined.
        let redis = match config.redis_url.as_deref() {
            Some(url) => match crate::cache::connect(url).await {
                Ok(conn) => {
                    tracing::info!("Redis connected, sessions and presence on cache backend");
                    Some(conn)
                }
                Err(e) => {
                    tracing::warn!(
                        "Redis connection failed, falling back to database backend: {}",
                        e
                    );
                    None
                }
            },
            None => {
                tracing::info!("No REDIS_URL configured, sessions and presence on database");
                None
            }
        };

        let service = AuthService::new(db.clone(), redis.clone(), config.clone());

        Ok(App {
            config,
            db,
            redis,
            service,
        })
    }

    /// Build the full router with middleware applied.
    pub fn router(&self) -> Router {
        let rate_limiter = Arc::new(RateLimiter::new(
            self.config.rate_limit_max_requests,
            std::time::Duration::from_secs(self.config.rate_limit_window_secs),
            std::time::Duration::from_secs(self.config.rate_limit_cleanup_secs),
        ));

        let state = AppState {
            service: self.service.clone(),
            config: Arc::new(self.config.clone()),
            rate_limiter,
        };

        let mut router = Router::new()
            .route("/health", get(health))
            .merge(controllers::routes().with_state(state.clone()))
            .merge(Scalar::with_url("/api-docs", ApiDoc::openapi()))
            .layer(axum::middleware::from_fn_with_state(
                state,
                rate_limit_middleware,
            ))
            .layer(CorsLayer::permissive());

        if self.config.is_dev() {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Run the application server until interrupted.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let addr = self.config.server_addr();
        let router = self.router();

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("Warden listening on http://{}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    tracing::info!("Shutting down...");
}
