//! Book (catalog item) model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Catalog item as stored.
///
/// `available` is false exactly while one borrow request for this book is on loan.
/// Only the lending transitions in [`crate::services::loans`] change it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub category: String,
    pub available: bool,
    /// Reference to the stored PDF, if one was uploaded
    pub pdf_path: Option<String>,
}

/// Fields needed to ingest a book into a store
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub category: String,
    pub pdf_path: Option<String>,
}

impl NewBook {
    pub fn new(title: &str, author: &str, category: &str) -> Self {
        Self {
            title: title.to_string(),
            author: author.to_string(),
            category: category.to_string(),
            pdf_path: None,
        }
    }
}
