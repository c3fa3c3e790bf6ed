//! Health check handler.

use axum::{extract::State, http::StatusCode};
use std::sync::Arc;

use crate::web::state::AppState;

/// GET /health - `OK` while the store is reachable.
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    if state.health.is_available() {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE")
    }
}
