use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::controllers::AppState;
use crate::error::AuthError;

/// In-memory fixed-window rate limiter with lazy, amortized cleanup.
///
/// Tracks a counter and a window expiry per client id. Expired entries are
/// swept in bulk whenever `cleanup_interval` has elapsed since the last
/// sweep, so cleanup cost is O(1) amortized per request instead of a timer
/// per entry.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    cleanup_interval: Duration,
    inner: Mutex<Inner>,
}

struct Inner {
    counts: HashMap<String, u32>,
    expiry: HashMap<String, Instant>,
    last_cleanup: Instant,
}

impl RateLimiter {
    /// Create a new rate limiter.
    pub fn new(limit: u32, window: Duration, cleanup_interval: Duration) -> Self {
        Self {
            limit,
            window,
            cleanup_interval,
            inner: Mutex::new(Inner {
                counts: HashMap::new(),
                expiry: HashMap::new(),
                last_cleanup: Instant::now(),
            }),
        }
    }

    /// Check whether a request from `client_id` is allowed.
    ///
    /// The whole read-modify-write happens under one lock, so concurrent
    /// requests from the same client cannot both claim the last slot.
    pub fn allow(&self, client_id: &str) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap();

        if now.duration_since(inner.last_cleanup) > self.cleanup_interval {
            inner.sweep_expired(now);
            inner.last_cleanup = now;
        }

        match inner.expiry.get(client_id) {
            Some(expiry) if now <= *expiry => {}
            _ => {
                // no window yet, or the previous one elapsed
                inner.counts.insert(client_id.to_string(), 1);
                inner
                    .expiry
                    .insert(client_id.to_string(), now + self.window);
                return true;
            }
        }

        let count = inner.counts.entry(client_id.to_string()).or_insert(0);
        if *count < self.limit {
            *count += 1;
            return true;
        }

        false
    }
}

impl Inner {
    fn sweep_expired(&mut self, now: Instant) {
        let counts = &mut self.counts;
        self.expiry.retain(|client_id, expiry| {
            if now > *expiry {
                counts.remove(client_id);
                false
            } else {
                true
            }
        });
    }
}

/// Axum middleware guarding the request boundary before anything else runs.
///
/// Preflight requests bypass the limiter entirely.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if req.method() == Method::OPTIONS {
        return next.run(req).await;
    }

    let client_id = client_ip(req.headers());

    if !state.rate_limiter.allow(&client_id) {
        return AuthError::TooManyRequests.into_response();
    }

    next.run(req).await
}

/// Best-effort client identity from proxy headers.
fn client_ip(headers: &axum::http::HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or("").trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}
