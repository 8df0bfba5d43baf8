//! Error types for the Libris server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable error codes returned to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    DbFailure = 2,
    NoSuchData = 3,
    NotAvailable = 4,
    BadValue = 5,
    StoreTimeout = 6,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store timeout: {0}")]
    Timeout(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Classify constraint violations raised by Postgres.
    ///
    /// The "one active request per book" index surfaces as a unique violation and
    /// a dangling book/patron reference as a foreign-key violation; both are client
    /// errors rather than store failures.
    pub fn from_db(err: sqlx::Error) -> Self {
        let code = err
            .as_database_error()
            .and_then(|db| db.code())
            .map(|c| c.into_owned());

        match code.as_deref() {
            Some("23505") => {
                AppError::Conflict("Book already has an active borrow request".to_string())
            }
            Some("23503") => AppError::NotFound("Referenced book or patron not found".to_string()),
            _ => AppError::Database(err),
        }
    }

    fn parts(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchData),
            // Unavailable items and illegal transitions are reported as bad requests
            AppError::Conflict(_) => (StatusCode::BAD_REQUEST, ErrorCode::NotAvailable),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure),
            AppError::Timeout(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::StoreTimeout),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure),
        }
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();

        let message = match &self {
            AppError::NotFound(msg) | AppError::Conflict(msg) | AppError::Validation(msg) => {
                msg.clone()
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Timeout(msg) => {
                tracing::error!("Store timeout: {}", msg);
                "Store did not respond in time".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_4xx() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Conflict("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_store_failures_map_to_500() {
        let db = AppError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(db.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let timeout = AppError::Timeout("get_by_id".into());
        assert_eq!(timeout.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_from_db_passes_through_non_constraint_errors() {
        assert!(matches!(
            AppError::from_db(sqlx::Error::RowNotFound),
            AppError::Database(_)
        ));
    }
}
