//! Router configuration for the HTTP boundary.

use axum::{
    extract::DefaultBodyLimit,
    handler::Handler,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{get_content, health_check, submit_password, upload};
use super::middleware::{
    create_cors_layer, password_rate_limit, require_store, security_headers, upload_rate_limit,
    RateLimitState,
};
use super::state::AppState;

/// Create the main router.
///
/// Every route except `/health` is gated on store availability. Uploads and
/// password submissions are rate-limited per client IP.
pub fn create_router(
    app_state: Arc<AppState>,
    rate_limits: Arc<RateLimitState>,
    cors_origins: &[String],
) -> Router {
    let upload_limits = rate_limits.clone();
    let password_limits = rate_limits;
    let health = app_state.health.clone();

    // The pipeline enforces its own limits while streaming
    let upload_routes = Router::new()
        .route("/upload", post(upload))
        .route_layer(middleware::from_fn(move |req, next| {
            upload_rate_limit(upload_limits.clone(), req, next)
        }))
        .layer(DefaultBodyLimit::disable());

    let content_route = get(get_content).post(submit_password.layer(middleware::from_fn(
        move |req, next| password_rate_limit(password_limits.clone(), req, next),
    )));

    let core_routes = Router::new()
        .route("/:id", content_route)
        .merge(upload_routes)
        .layer(middleware::from_fn(move |req, next| {
            require_store(health.clone(), req, next)
        }));

    Router::new()
        .route("/health", get(health_check))
        .merge(core_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(middleware::from_fn(security_headers)),
        )
        .with_state(app_state)
}
