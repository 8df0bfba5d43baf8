//! API handlers for the Libris REST endpoints

pub mod books;
pub mod borrow_requests;
pub mod health;
pub mod openapi;
pub mod patrons;
pub mod return_requests;

use axum::{
    extract::rejection::JsonRejection,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::borrow_request::{BorrowRequest, Decision},
    AppState,
};

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// Body naming the patron behind a borrow or return
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PatronRequest {
    /// Patron (user) ID
    #[validate(
        required(message = "user_id is required"),
        range(min = 1, message = "user_id must be positive")
    )]
    pub user_id: Option<i32>,
}

impl PatronRequest {
    pub fn user_id(&self) -> AppResult<i32> {
        self.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        self.user_id
            .ok_or_else(|| AppError::Validation("user_id is required".to_string()))
    }
}

/// Staff decision body: `{"status": "approved" | "rejected"}`
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DecisionRequest {
    #[validate(required(message = "status is required"))]
    pub status: Option<String>,
}

impl DecisionRequest {
    pub fn decision(&self) -> AppResult<Decision> {
        self.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        self.status.as_deref().unwrap_or_default().parse()
    }
}

/// Outcome of a lending operation
#[derive(Debug, Serialize, ToSchema)]
pub struct LendingResponse {
    /// Human readable outcome
    pub message: String,
    /// The request after the operation
    pub request: BorrowRequest,
}

/// Create the application router with all routes
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Catalog
        .route("/books", get(books::list_books))
        .route("/books/:id", get(books::get_book))
        .route("/books/:id/borrow", post(books::borrow_book))
        .route("/books/:id/return", post(books::return_book))
        .route("/books/:id/reconcile", post(books::reconcile_book))
        // Borrow requests
        .route("/borrow-requests", get(borrow_requests::list_borrow_requests))
        .route("/borrow-requests/:id", get(borrow_requests::get_borrow_request))
        .route(
            "/borrow-requests/:id/decision",
            post(borrow_requests::decide_borrow_request),
        )
        // Return requests
        .route("/return-requests", get(return_requests::list_return_requests))
        .route(
            "/return-requests/:id/decision",
            post(return_requests::decide_return_request),
        )
        // Patrons
        .route(
            "/patrons/:id/borrow-requests",
            get(patrons::list_patron_borrow_requests),
        )
        .route("/patrons/:id/borrowed", get(patrons::list_patron_borrowed))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
