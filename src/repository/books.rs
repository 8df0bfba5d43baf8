//! Books table access for the Postgres ledger

use async_trait::async_trait;

use super::{CatalogStore, PgLedger};
use crate::{
    error::{AppError, AppResult},
    models::book::Book,
};

#[async_trait]
impl CatalogStore for PgLedger {
    async fn get_book(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            "SELECT id, title, author, category, available, pdf_path FROM books WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn list_books(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            "SELECT id, title, author, category, available, pdf_path FROM books ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    async fn set_availability(&self, id: i32, available: bool) -> AppResult<()> {
        let result = sqlx::query("UPDATE books SET available = $1 WHERE id = $2")
            .bind(available)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }

        Ok(())
    }
}
