//! Cache-backend tests. These need a live Redis and only run when
//! `REDIS_URL` is set, e.g. `REDIS_URL=redis://127.0.0.1/ cargo test`.

use std::time::Duration;

use redis::aio::ConnectionManager;
use warden::auth::presence::{PresenceTracker, RedisPresence};
use warden::auth::session::{RedisSessionStore, SessionStore};

async fn redis_conn() -> Option<ConnectionManager> {
    let url = std::env::var("REDIS_URL").ok()?;
    Some(
        warden::cache::connect(&url)
            .await
            .expect("REDIS_URL set but connection failed"),
    )
}

const SECRET: &str = "test-secret-key-for-testing";

#[tokio::test]
async fn test_redis_issue_validate_revoke() {
    let Some(conn) = redis_conn().await else { return };
    let store = RedisSessionStore::new(conn, SECRET.to_string(), 60, 3600);

    let token = store.issue(9001, false).await.expect("issue failed");
    store.validate(9001, &token).await.expect("validate failed");

    store.revoke_all(9001).await.expect("revoke failed");
    assert!(store.validate(9001, &token).await.is_err());
}

#[tokio::test]
async fn test_redis_issue_with_revoke_replaces_sessions() {
    let Some(conn) = redis_conn().await else { return };
    let store = RedisSessionStore::new(conn, SECRET.to_string(), 60, 3600);

    let first = store.issue(9002, false).await.unwrap();
    let second = store.issue(9002, true).await.unwrap();

    assert!(store.validate(9002, &first).await.is_err());
    store.validate(9002, &second).await.expect("fresh session invalid");

    store.revoke_all(9002).await.unwrap();
}

#[tokio::test]
async fn test_redis_sliding_window_expiry_and_refresh() {
    let Some(conn) = redis_conn().await else { return };
    // 2s sliding window; the signed claim carries the long absolute TTL.
    let store = RedisSessionStore::new(conn, SECRET.to_string(), 2, 3600);

    let token = store.issue(9003, false).await.unwrap();

    // Touch at 1.2s to slide the window, then again past the original
    // deadline. The session must survive both.
    tokio::time::sleep(Duration::from_millis(1200)).await;
    store.validate(9003, &token).await.expect("slid session expired");
    tokio::time::sleep(Duration::from_millis(1200)).await;
    store.validate(9003, &token).await.expect("refresh did not slide");

    // Left idle past the window, the key expires.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(store.validate(9003, &token).await.is_err());
}

#[tokio::test]
async fn test_absolute_lifetime_caps_continuously_refreshed_session() {
    let Some(conn) = redis_conn().await else { return };

    // 2s sliding window under a 4s hard cap. Validating through the
    // service exercises the signed claim, which is what enforces the cap.
    let config = warden::Config {
        session_ttl_secs: 2,
        session_absolute_ttl_secs: 4,
        ..warden::testing::test_config()
    };
    let db = warden::testing::test_db().await;
    let service = warden::AuthService::new(db, Some(conn), config);

    let user = service
        .register("capped", "capped@example.com", "pw123456", None)
        .await
        .unwrap();
    let token = match service.login("capped", "pw123456").await.unwrap() {
        warden::LoginOutcome::Session { token, .. } => token,
        _ => panic!("expected session"),
    };

    // Keep the sliding window fresh the whole time.
    for _ in 0..3 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        service
            .validate_token(&token)
            .await
            .expect("session expired before the absolute cap");
    }

    // Past the cap the key is still alive (last refresh 1.5s ago), but
    // the claim has expired.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(service.validate_token(&token).await.is_err());

    service.logout(user.id).await.unwrap();
}

#[tokio::test]
async fn test_redis_presence_window() {
    let Some(conn) = redis_conn().await else { return };
    let presence = RedisPresence::new(conn, 2);

    presence.touch(9004);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let online = presence.online_ids().await.unwrap();
    assert!(online.contains(&9004));

    tokio::time::sleep(Duration::from_millis(2500)).await;
    let online = presence.online_ids().await.unwrap();
    assert!(!online.contains(&9004));
}
