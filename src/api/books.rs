//! Book (catalog) endpoints, including patron borrow and return

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use crate::{error::AppResult, models::book::Book};

use super::{LendingResponse, PatronRequest};

/// List all books
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    responses(
        (status = 200, description = "All books in the catalog", body = Vec<Book>)
    )
)]
pub async fn list_books(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.list_books().await?;
    Ok(Json(books))
}

/// Get book details by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

/// Ask to borrow a book
#[utoipa::path(
    post,
    path = "/books/{id}/borrow",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    request_body = PatronRequest,
    responses(
        (status = 200, description = "Borrow request submitted", body = LendingResponse),
        (status = 400, description = "Missing patron or book not available"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn borrow_book(
    State(state): State<crate::AppState>,
    Path(book_id): Path<i32>,
    payload: Result<Json<PatronRequest>, JsonRejection>,
) -> AppResult<Json<LendingResponse>> {
    let Json(body) = payload?;
    let user_id = body.user_id()?;

    let request = state
        .services
        .loans
        .create_borrow_request(book_id, user_id)
        .await?;

    Ok(Json(LendingResponse {
        message: "Borrow request submitted successfully".to_string(),
        request,
    }))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/books/{id}/return",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    request_body = PatronRequest,
    responses(
        (status = 200, description = "Book returned", body = LendingResponse),
        (status = 400, description = "Missing patron or ambiguous loan"),
        (status = 404, description = "No approved borrow request for this book and patron")
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    Path(book_id): Path<i32>,
    payload: Result<Json<PatronRequest>, JsonRejection>,
) -> AppResult<Json<LendingResponse>> {
    let Json(body) = payload?;
    let user_id = body.user_id()?;

    let request = state.services.loans.request_return(book_id, user_id).await?;

    Ok(Json(LendingResponse {
        message: "Book returned successfully".to_string(),
        request,
    }))
}

/// Recompute a book's availability from its borrow requests
#[utoipa::path(
    post,
    path = "/books/{id}/reconcile",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book with repaired availability", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn reconcile_book(
    State(state): State<crate::AppState>,
    Path(book_id): Path<i32>,
) -> AppResult<Json<Book>> {
    let book = state.services.loans.reconcile_availability(book_id).await?;
    Ok(Json(book))
}
