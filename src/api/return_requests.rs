//! Return request endpoints (staff side)

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use crate::{
    error::AppResult,
    models::borrow_request::{BorrowRequestDetails, Decision},
};

use super::{DecisionRequest, LendingResponse};

/// List requests awaiting a return decision
#[utoipa::path(
    get,
    path = "/return-requests",
    tag = "return-requests",
    responses(
        (status = 200, description = "Requests in pending-return with book and patron", body = Vec<BorrowRequestDetails>)
    )
)]
pub async fn list_return_requests(
    State(state): State<crate::AppState>,
) -> AppResult<Json<Vec<BorrowRequestDetails>>> {
    let requests = state.services.loans.list_pending_return_requests().await?;
    Ok(Json(requests))
}

/// Approve or reject a pending return
#[utoipa::path(
    post,
    path = "/return-requests/{id}/decision",
    tag = "return-requests",
    params(
        ("id" = i32, Path, description = "Borrow request ID")
    ),
    request_body = DecisionRequest,
    responses(
        (status = 200, description = "Decision recorded", body = LendingResponse),
        (status = 400, description = "Invalid status or request not awaiting return"),
        (status = 404, description = "Request not found")
    )
)]
pub async fn decide_return_request(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    payload: Result<Json<DecisionRequest>, JsonRejection>,
) -> AppResult<Json<LendingResponse>> {
    let Json(body) = payload?;
    let decision = body.decision()?;

    let request = state
        .services
        .loans
        .decide_return_request(id, decision)
        .await?;

    let message = match decision {
        Decision::Approved => "Return request approved",
        Decision::Rejected => "Return request rejected",
    };

    Ok(Json(LendingResponse {
        message: message.to_string(),
        request,
    }))
}
