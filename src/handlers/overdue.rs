use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::{ApiResponse, PaginatedResponse};
use crate::services::overdue::{OverdueQuery, OverdueRecord, OverdueService, OverdueStats};

pub async fn list_overdue(
    State(service): State<Arc<OverdueService>>,
    Query(query): Query<OverdueQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<OverdueRecord>>>, ApiError> {
    let result = service.list_overdue(query).await?;

    Ok(Json(ApiResponse::ok(result)))
}

pub async fn get_overdue_stats(
    State(service): State<Arc<OverdueService>>,
) -> Result<Json<ApiResponse<OverdueStats>>, ApiError> {
    let stats = service.overdue_stats().await?;

    Ok(Json(ApiResponse::ok(stats)))
}
