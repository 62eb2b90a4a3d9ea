use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::db;
use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub version: String,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (code, database) = match &state.db_pool {
        Some(pool) => match db::check_health(pool).await {
            Ok(()) => (StatusCode::OK, "connected".to_string()),
            Err(e) => (StatusCode::SERVICE_UNAVAILABLE, format!("error: {}", e)),
        },
        None => (StatusCode::OK, "in-memory".to_string()),
    };

    let status = if code == StatusCode::OK {
        "healthy"
    } else {
        "unhealthy"
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            database,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
