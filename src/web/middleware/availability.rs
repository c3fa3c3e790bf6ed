//! Store availability gate.

use axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::health::HealthCheck;
use crate::web::error::ApiError;

/// Answer 503 without touching the core while the store is down.
pub async fn require_store(
    health: Arc<dyn HealthCheck>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !health.is_available() {
        tracing::debug!(path = %req.uri().path(), "Rejecting request while store is unavailable");
        return ApiError::service_unavailable().into_response();
    }

    next.run(req).await
}
