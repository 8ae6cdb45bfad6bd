//! Warden: session, credential and presence management service.
//!
//! Tokens are signed JWTs backed by a revocation store; the store and the
//! presence tracker each run on Redis when configured, otherwise on the
//! relational database. All token kinds share one signing secret and are
//! distinguished by a `kind` claim.

pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod controllers;
pub mod db;
pub mod error;
pub mod extractors;
pub mod logging;
pub mod migrations;
pub mod models;
pub mod oauth;
pub mod openapi;
pub mod response;
pub mod service;
pub mod testing;

pub use app::App;
pub use config::Config;
pub use error::AuthError;
pub use response::ApiResponse;
pub use service::{AuthService, LoginOutcome};
