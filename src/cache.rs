use redis::aio::ConnectionManager;

use crate::error::AuthError;

/// Connect to redis and verify the connection with a PING.
///
/// The returned [`ConnectionManager`] multiplexes over one connection and
/// reconnects on failure; it is cheap to clone and share.
pub async fn connect(url: &str) -> Result<ConnectionManager, AuthError> {
    let client = redis::Client::open(url)
        .map_err(|e| AuthError::Internal(format!("Invalid redis URL: {}", e)))?;

    let mut conn = ConnectionManager::new(client)
        .await
        .map_err(|e| AuthError::Internal(format!("Redis connection error: {}", e)))?;

    let _: String = redis::cmd("PING")
        .query_async(&mut conn)
        .await
        .map_err(|e| AuthError::Internal(format!("Redis ping failed: {}", e)))?;

    tracing::info!("connected to redis");
    Ok(conn)
}
