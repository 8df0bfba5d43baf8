//! Borrow request endpoints (staff side)

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use crate::{
    error::AppResult,
    models::borrow_request::{BorrowRequestDetails, Decision},
};

use super::{DecisionRequest, LendingResponse};

/// List pending borrow requests, oldest first
#[utoipa::path(
    get,
    path = "/borrow-requests",
    tag = "borrow-requests",
    responses(
        (status = 200, description = "Pending borrow requests with book and patron", body = Vec<BorrowRequestDetails>)
    )
)]
pub async fn list_borrow_requests(
    State(state): State<crate::AppState>,
) -> AppResult<Json<Vec<BorrowRequestDetails>>> {
    let requests = state.services.loans.list_pending_borrow_requests().await?;
    Ok(Json(requests))
}

/// Get a borrow request by ID
#[utoipa::path(
    get,
    path = "/borrow-requests/{id}",
    tag = "borrow-requests",
    params(
        ("id" = i32, Path, description = "Borrow request ID")
    ),
    responses(
        (status = 200, description = "Borrow request with book and patron", body = BorrowRequestDetails),
        (status = 404, description = "Borrow request not found")
    )
)]
pub async fn get_borrow_request(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<BorrowRequestDetails>> {
    let request = state.services.loans.get_request_details(id).await?;
    Ok(Json(request))
}

/// Approve or reject a pending borrow request
#[utoipa::path(
    post,
    path = "/borrow-requests/{id}/decision",
    tag = "borrow-requests",
    params(
        ("id" = i32, Path, description = "Borrow request ID")
    ),
    request_body = DecisionRequest,
    responses(
        (status = 200, description = "Decision recorded", body = LendingResponse),
        (status = 400, description = "Invalid status or request not pending"),
        (status = 404, description = "Borrow request not found")
    )
)]
pub async fn decide_borrow_request(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    payload: Result<Json<DecisionRequest>, JsonRejection>,
) -> AppResult<Json<LendingResponse>> {
    let Json(body) = payload?;
    let decision = body.decision()?;

    let request = state
        .services
        .loans
        .decide_borrow_request(id, decision)
        .await?;

    let message = match decision {
        Decision::Approved => "Borrow request approved",
        Decision::Rejected => "Borrow request rejected",
    };

    Ok(Json(LendingResponse {
        message: message.to_string(),
        request,
    }))
}
