use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::ApiResponse;
use crate::services::statistics::{LoanStatsSnapshot, StatisticsService, StatsQuery};

pub async fn get_statistics(
    State(service): State<Arc<StatisticsService>>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<ApiResponse<LoanStatsSnapshot>>, ApiError> {
    let snapshot = service.compute_stats(query).await?;

    Ok(Json(ApiResponse::ok(snapshot)))
}
