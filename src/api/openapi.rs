//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, borrow_requests, health, patrons, return_requests};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Libris API",
        version = "1.0.0",
        description = "Library lending REST API: borrow and return request lifecycle",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::get_book,
        books::borrow_book,
        books::return_book,
        books::reconcile_book,
        // Borrow requests
        borrow_requests::list_borrow_requests,
        borrow_requests::get_borrow_request,
        borrow_requests::decide_borrow_request,
        // Return requests
        return_requests::list_return_requests,
        return_requests::decide_return_request,
        // Patrons
        patrons::list_patron_borrow_requests,
        patrons::list_patron_borrowed,
    ),
    components(
        schemas(
            crate::models::book::Book,
            crate::models::borrow_request::BorrowRequest,
            crate::models::borrow_request::BorrowRequestDetails,
            crate::models::borrow_request::RequestStatus,
            crate::models::user::Patron,
            crate::models::user::Role,
            crate::api::PatronRequest,
            crate::api::DecisionRequest,
            crate::api::LendingResponse,
            health::HealthResponse,
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Catalog and patron borrow/return"),
        (name = "borrow-requests", description = "Staff decisions on borrow requests"),
        (name = "return-requests", description = "Staff decisions on returns"),
        (name = "patrons", description = "Per-patron lending views")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
