//! API hardening middleware: bearer auth, per-IP rate limiting, CORS

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use tower_http::cors::{AllowOrigin, CorsLayer};

use loko_core::ident;

use crate::ApiState;

/// Bearer-token check; a no-op when no API key is configured.
pub async fn auth(
    State(state): State<Arc<ApiState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.config.api.key.as_deref() else {
        return next.run(request).await;
    };
    let authorized = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| token == expected)
        .unwrap_or(false);
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "missing or invalid bearer token").into_response();
    }
    next.run(request).await
}

/// Fixed-window request counters per client IP.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: DashMap<IpAddr, (Instant, u32)>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the request fits the per-minute budget. A limit of 0
    /// disables limiting entirely.
    pub fn allow(&self, ip: IpAddr, limit: u32) -> bool {
        if limit == 0 {
            return true;
        }
        let now = Instant::now();
        let mut entry = self.windows.entry(ip).or_insert((now, 0));
        let (start, count) = *entry;
        if now.duration_since(start) >= Duration::from_secs(60) {
            *entry = (now, 1);
            return true;
        }
        if count >= limit {
            return false;
        }
        *entry = (start, count + 1);
        true
    }
}

pub struct RateLimitState {
    pub api: Arc<ApiState>,
    pub limiter: RateLimiter,
}

pub async fn rate_limit(
    State(state): State<Arc<RateLimitState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if !state.limiter.allow(addr.ip(), state.api.config.api.rate_limit) {
        return (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response();
    }
    next.run(request).await
}

/// CORS allow-list with glob origins (e.g. `http://localhost:*`).
pub fn cors_layer(allowed_origins: Vec<String>) -> CorsLayer {
    CorsLayer::new()
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin
                .to_str()
                .map(|origin| ident::match_any(origin, &allowed_origins))
                .unwrap_or(false)
        }))
}
