use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::loan::{CreateLoanRequest, ListLoansQuery, LoanView};
use crate::loan_service::LoanService;
use crate::models::{ApiResponse, PaginatedResponse};

pub async fn create_loan(
    State(service): State<Arc<LoanService>>,
    Json(request): Json<CreateLoanRequest>,
) -> Result<(StatusCode, Json<ApiResponse<LoanView>>), ApiError> {
    let loan = service.create_loan(request).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(loan))))
}

pub async fn get_loan(
    State(service): State<Arc<LoanService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<LoanView>>, ApiError> {
    let loan = service.get_loan(id).await?;

    Ok(Json(ApiResponse::ok(loan)))
}

pub async fn list_loans(
    State(service): State<Arc<LoanService>>,
    Query(query): Query<ListLoansQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<LoanView>>>, ApiError> {
    let result = service.list_loans(query).await?;

    Ok(Json(ApiResponse::ok(result)))
}

pub async fn return_loan(
    State(service): State<Arc<LoanService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<LoanView>>, ApiError> {
    let loan = service.return_loan(id).await?;

    Ok(Json(ApiResponse::ok(loan)))
}

pub async fn mark_loan_lost(
    State(service): State<Arc<LoanService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<LoanView>>, ApiError> {
    let loan = service.mark_lost(id).await?;

    Ok(Json(ApiResponse::ok(loan)))
}
