use std::sync::Arc;

use axum::Router;

use crate::auth::rate_limit::RateLimiter;
use crate::config::Config;
use crate::service::AuthService;

/// Shared application state available in all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: AuthService,
    pub config: Arc<Config>,
    pub rate_limiter: Arc<RateLimiter>,
}

pub mod users;

pub fn routes() -> Router<AppState> {
    Router::new().nest("/api/users", users::routes())
}
