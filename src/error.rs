use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::response::ApiResponse;

/// Standard error type for the warden service.
///
/// Domain guards (wrong credentials, wrong 2FA state, duplicate identity)
/// are typed variants so the HTTP boundary can map them without inspecting
/// message text. Backend failures map to 500 and keep their detail out of
/// the response body.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl AuthError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Redis(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::NotFound(_) => "NOT_FOUND",
            AuthError::BadRequest(_) => "BAD_REQUEST",
            AuthError::Unauthorized(_) => "UNAUTHORIZED",
            AuthError::Conflict(_) => "CONFLICT",
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::TooManyRequests => "TOO_MANY_REQUESTS",
            AuthError::Internal(_) => "INTERNAL_ERROR",
            AuthError::Database(_) => "INTERNAL_ERROR",
            AuthError::Redis(_) => "INTERNAL_ERROR",
        }
    }

    fn is_internal(&self) -> bool {
        matches!(
            self,
            AuthError::Internal(_) | AuthError::Database(_) | AuthError::Redis(_)
        )
    }
}

/// Error detail for API responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl axum::response::IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();

        // Backend failures are logged with full detail server-side and
        // surfaced to the caller as an opaque message.
        let message = if self.is_internal() {
            tracing::error!(error = %self, "internal error");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body: ApiResponse<()> = ApiResponse {
            success: false,
            data: None,
            error: Some(ErrorDetail {
                code: self.error_code().to_string(),
                message,
            }),
        };

        (status, axum::Json(body)).into_response()
    }
}
