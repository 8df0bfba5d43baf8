//! Catalog read service

use std::time::Duration;

use super::bounded;
use crate::{error::AppResult, models::book::Book, repository::Repository};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    store_timeout: Duration,
}

impl CatalogService {
    pub fn new(repository: Repository, store_timeout: Duration) -> Self {
        Self {
            repository,
            store_timeout,
        }
    }

    /// List all books
    pub async fn list_books(&self) -> AppResult<Vec<Book>> {
        bounded(
            self.store_timeout,
            "list_books",
            self.repository.ledger.list_books(),
        )
        .await
    }

    /// Get a book by ID
    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        bounded(self.store_timeout, "get_book", self.repository.ledger.get_book(id)).await
    }
}
