//! Patron-centred lending views

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{error::AppResult, models::borrow_request::BorrowRequestDetails};

/// List a patron's pending borrow requests
#[utoipa::path(
    get,
    path = "/patrons/{id}/borrow-requests",
    tag = "patrons",
    params(
        ("id" = i32, Path, description = "Patron ID")
    ),
    responses(
        (status = 200, description = "Pending borrow requests", body = Vec<BorrowRequestDetails>),
        (status = 404, description = "No pending borrow requests found")
    )
)]
pub async fn list_patron_borrow_requests(
    State(state): State<crate::AppState>,
    Path(user_id): Path<i32>,
) -> AppResult<Json<Vec<BorrowRequestDetails>>> {
    let requests = state
        .services
        .loans
        .list_patron_pending_requests(user_id)
        .await?;
    Ok(Json(requests))
}

/// List the books a patron currently holds
#[utoipa::path(
    get,
    path = "/patrons/{id}/borrowed",
    tag = "patrons",
    params(
        ("id" = i32, Path, description = "Patron ID")
    ),
    responses(
        (status = 200, description = "Loans currently held by the patron", body = Vec<BorrowRequestDetails>)
    )
)]
pub async fn list_patron_borrowed(
    State(state): State<crate::AppState>,
    Path(user_id): Path<i32>,
) -> AppResult<Json<Vec<BorrowRequestDetails>>> {
    let loans = state.services.loans.list_patron_borrowed(user_id).await?;
    Ok(Json(loans))
}
