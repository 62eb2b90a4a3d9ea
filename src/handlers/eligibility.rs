use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::ApiResponse;
use crate::services::{EligibilityDecision, EligibilityEvaluator};

#[derive(Debug, Deserialize, Default)]
pub struct EligibilityQuery {
    pub resource_id: Option<Uuid>,
}

/// A refusal is still a 200; only unknown ids are errors
pub async fn check_eligibility(
    State(evaluator): State<Arc<EligibilityEvaluator>>,
    Path(person_id): Path<Uuid>,
    Query(query): Query<EligibilityQuery>,
) -> Result<Json<ApiResponse<EligibilityDecision>>, ApiError> {
    let decision = evaluator.can_borrow(person_id, query.resource_id).await?;

    Ok(Json(ApiResponse::ok(decision)))
}
