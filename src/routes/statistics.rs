//! Statistics route definitions

use axum::{routing::get, Router};

use crate::handlers::*;
use crate::state::AppState;

pub fn statistics_routes() -> Router<AppState> {
    Router::new().route("/api/statistics", get(get_statistics))
}
