//! Request tagging and rate limiting for the HTTP API.
//!
//! Every response carries an `x-request-id`, reused from the request when
//! present. API routes share one fixed-window counter; a request over the
//! limit gets 429 with `retry-after` set to the seconds left in the window.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::ApiError;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Fixed-window limiter shared by every API route.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<RateLimitWindow>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(RateLimitWindow {
                started_at: Instant::now(),
                count: 0,
            })),
        }
    }

    /// Count one request. `Err` holds the time until the window resets.
    pub async fn try_acquire(&self) -> Result<(), Duration> {
        let mut window = self.state.lock().await;
        let elapsed = window.started_at.elapsed();
        if elapsed >= self.window {
            window.started_at = Instant::now();
            window.count = 0;
        } else if window.count >= self.max_requests {
            return Err(self.window - elapsed);
        }
        window.count += 1;
        Ok(())
    }
}

/// Whole seconds, rounded up, never below one.
fn retry_after_secs(remaining: Duration) -> u64 {
    let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    secs.max(1)
}

/// Reuse a non-blank `x-request-id` or generate a `UUIDv4`. The id goes
/// into request extensions as [`RequestId`] and back on the response.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert(REQUEST_ID_HEADER, val);
    }

    res
}

pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let Err(remaining) = rate_limit.try_acquire().await else {
        return next.run(req).await;
    };

    let req_id = req
        .extensions()
        .get::<RequestId>()
        .map(|r| r.0.clone())
        .unwrap_or_default();
    let retry_after = retry_after_secs(remaining);
    tracing::warn!(
        request_id = %req_id,
        path = %req.uri().path(),
        retry_after,
        "rate limit exceeded"
    );
    let mut res = ApiError::new(req_id, "rate_limited", "rate limit exceeded").into_response();
    res.headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    res
}
