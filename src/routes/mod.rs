//! Route definitions for LendingDesk API

mod eligibility;
mod loan;
mod overdue;
mod statistics;

use axum::{routing::get, Router};

pub use eligibility::eligibility_routes;
pub use loan::loan_routes;
pub use overdue::overdue_routes;
pub use statistics::statistics_routes;

use crate::handlers::health_check;
use crate::middleware;
use crate::state::AppState;

/// Full API router with tracing and security headers; CORS is left to the caller
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(loan_routes())
        .merge(eligibility_routes())
        .merge(overdue_routes())
        .merge(statistics_routes())
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_tracing))
}

async fn root() -> &'static str {
    "LendingDesk API Server"
}
