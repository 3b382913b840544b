//! Axum router setup for the API server

use std::sync::Arc;

use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;

use crate::docs::DOCS_HTML;
use crate::handlers;
use crate::middleware::{self, RateLimitState, RateLimiter};
use crate::openapi;
use crate::ApiState;

/// Create the router with all routes and the configured middleware.
pub fn create_router(state: Arc<ApiState>) -> Router {
    let mut api = Router::new()
        .route("/project", get(handlers::get_project))
        .route("/systems", get(handlers::list_systems))
        .route("/systems/:id", get(handlers::get_system))
        .route("/build", post(handlers::start_build))
        .route("/build/:id", get(handlers::build_status))
        .route("/validate", get(handlers::validate))
        .route("/openapi.json", get(openapi_json))
        .route("/openapi.yaml", get(openapi_yaml))
        // Bearer auth only guards the API surface, never /health.
        .route_layer(axum::middleware::from_fn_with_state(Arc::clone(&state), middleware::auth));

    if state.config.api.rate_limit > 0 {
        let limiter = Arc::new(RateLimitState {
            api: Arc::clone(&state),
            limiter: RateLimiter::new(),
        });
        api = api.route_layer(axum::middleware::from_fn_with_state(limiter, middleware::rate_limit));
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api);

    if state.config.api.enable_swagger {
        router = router.route("/api/docs", get(docs_page));
    }

    router
        .layer(middleware::cors_layer(state.config.api.allowed_origins.clone()))
        .layer(TimeoutLayer::new(state.config.api.request_timeout()))
        .with_state(state)
}

async fn openapi_json() -> impl IntoResponse {
    axum::Json(openapi::document())
}

async fn openapi_yaml() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/yaml")], openapi::as_yaml())
}

async fn docs_page() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], DOCS_HTML)
}
