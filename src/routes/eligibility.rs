//! Eligibility route definitions

use axum::{routing::get, Router};

use crate::handlers::*;
use crate::state::AppState;

pub fn eligibility_routes() -> Router<AppState> {
    Router::new().route("/api/eligibility/:person_id", get(check_eligibility))
}
