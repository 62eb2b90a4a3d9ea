//! Overdue route definitions

use axum::{routing::get, Router};

use crate::handlers::*;
use crate::state::AppState;

pub fn overdue_routes() -> Router<AppState> {
    Router::new()
        .route("/api/overdue", get(list_overdue))
        .route("/api/overdue/stats", get(get_overdue_stats))
}
