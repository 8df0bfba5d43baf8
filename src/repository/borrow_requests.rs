//! Borrow request persistence and atomic transitions for the Postgres ledger

use async_trait::async_trait;
use sqlx::PgConnection;

use super::{LoanLedger, PgLedger, Reconciled, RequestStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        borrow_request::{
            BorrowRequest, BorrowRequestRow, NewBorrowRequest, RequestFilter, RequestStatus,
            RequestUpdate, Transition,
        },
    },
};

const FILTERED_REQUESTS: &str = r#"
    SELECT id, book_id, user_id, status, due_date, returned, requested_at
    FROM borrow_requests
    WHERE ($1::integer IS NULL OR book_id = $1)
      AND ($2::integer IS NULL OR user_id = $2)
      AND (cardinality($3::text[]) = 0 OR status = ANY($3))
    ORDER BY requested_at, id
"#;

const UPDATE_IF_STATUS: &str = r#"
    UPDATE borrow_requests
    SET status = $1, due_date = COALESCE($2, due_date), returned = $3
    WHERE id = $4 AND status = $5
    RETURNING id, book_id, user_id, status, due_date, returned, requested_at
"#;

/// Explain why a conditional update matched no row
async fn stale_request(conn: &mut PgConnection, id: i32, expected: RequestStatus) -> AppError {
    let current = sqlx::query_scalar::<_, String>("SELECT status FROM borrow_requests WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await;

    match current {
        Ok(None) => AppError::NotFound(format!("Borrow request with id {} not found", id)),
        Ok(Some(status)) => AppError::Conflict(format!(
            "Borrow request {} is {}, expected {}",
            id, status, expected
        )),
        Err(e) => AppError::Database(e),
    }
}

async fn update_if_status(
    conn: &mut PgConnection,
    id: i32,
    expected: RequestStatus,
    update: &RequestUpdate,
) -> AppResult<BorrowRequest> {
    let row = sqlx::query_as::<_, BorrowRequestRow>(UPDATE_IF_STATUS)
        .bind(update.status.as_str())
        .bind(update.due_date)
        .bind(update.returned)
        .bind(id)
        .bind(expected.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(AppError::from_db)?;

    match row {
        Some(row) => row.try_into(),
        None => Err(stale_request(conn, id, expected).await),
    }
}

#[async_trait]
impl RequestStore for PgLedger {
    async fn create_request(&self, request: NewBorrowRequest) -> AppResult<BorrowRequest> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent creates for the same book
        let available: Option<bool> =
            sqlx::query_scalar("SELECT available FROM books WHERE id = $1 FOR UPDATE")
                .bind(request.book_id)
                .fetch_optional(&mut *tx)
                .await?;

        match available {
            None => {
                return Err(AppError::NotFound(format!(
                    "Book with id {} not found",
                    request.book_id
                )))
            }
            Some(false) => return Err(AppError::Conflict("Book is not available".to_string())),
            Some(true) => {}
        }

        let active: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM borrow_requests WHERE book_id = $1 AND status = ANY($2))",
        )
        .bind(request.book_id)
        .bind(RequestFilter::with_statuses(&RequestStatus::ACTIVE).status_strings())
        .fetch_one(&mut *tx)
        .await?;

        if active {
            return Err(AppError::Conflict(
                "Book already has an active borrow request".to_string(),
            ));
        }

        let row = sqlx::query_as::<_, BorrowRequestRow>(
            r#"
            INSERT INTO borrow_requests (book_id, user_id, status, returned, requested_at)
            VALUES ($1, $2, $3, FALSE, $4)
            RETURNING id, book_id, user_id, status, due_date, returned, requested_at
            "#,
        )
        .bind(request.book_id)
        .bind(request.user_id)
        .bind(RequestStatus::Pending.as_str())
        .bind(request.requested_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from_db)?;

        tx.commit().await?;

        row.try_into()
    }

    async fn get_request(&self, id: i32) -> AppResult<BorrowRequest> {
        sqlx::query_as::<_, BorrowRequestRow>(
            r#"
            SELECT id, book_id, user_id, status, due_date, returned, requested_at
            FROM borrow_requests
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Borrow request with id {} not found", id)))?
        .try_into()
    }

    async fn find_one(&self, filter: &RequestFilter) -> AppResult<BorrowRequest> {
        sqlx::query_as::<_, BorrowRequestRow>(&format!("{} LIMIT 1", FILTERED_REQUESTS))
            .bind(filter.book_id)
            .bind(filter.user_id)
            .bind(filter.status_strings())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("No matching borrow request".to_string()))?
            .try_into()
    }

    async fn find_many(&self, filter: &RequestFilter) -> AppResult<Vec<BorrowRequest>> {
        sqlx::query_as::<_, BorrowRequestRow>(FILTERED_REQUESTS)
            .bind(filter.book_id)
            .bind(filter.user_id)
            .bind(filter.status_strings())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(BorrowRequest::try_from)
            .collect()
    }

    async fn update_request(
        &self,
        id: i32,
        expected: RequestStatus,
        update: &RequestUpdate,
    ) -> AppResult<BorrowRequest> {
        let mut conn = self.pool.acquire().await?;
        update_if_status(&mut *conn, id, expected, update).await
    }
}

#[async_trait]
impl LoanLedger for PgLedger {
    async fn apply_transition(&self, transition: &Transition) -> AppResult<BorrowRequest> {
        // Dropping `tx` on any early return rolls both writes back
        let mut tx = self.pool.begin().await?;

        let request = update_if_status(
            &mut *tx,
            transition.request_id,
            transition.expected,
            &transition.update,
        )
        .await?;

        if let Some(available) = transition.availability {
            // Lending requires the book to still be available; freeing it does not
            let result =
                sqlx::query("UPDATE books SET available = $1 WHERE id = $2 AND ($1 OR available)")
                    .bind(available)
                    .bind(transition.book_id)
                    .execute(&mut *tx)
                    .await?;

            if result.rows_affected() == 0 {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
                        .bind(transition.book_id)
                        .fetch_one(&mut *tx)
                        .await?;

                return Err(if exists {
                    AppError::Conflict(format!("Book {} is already on loan", transition.book_id))
                } else {
                    AppError::NotFound(format!("Book with id {} not found", transition.book_id))
                });
            }
        }

        tx.commit().await?;

        Ok(request)
    }

    async fn reconcile_availability(&self, book_id: i32) -> AppResult<Reconciled> {
        let mut tx = self.pool.begin().await?;

        // Transitions that flip availability wait on this row lock
        let book = sqlx::query_as::<_, Book>(
            "SELECT id, title, author, category, available, pdf_path FROM books WHERE id = $1 FOR UPDATE",
        )
        .bind(book_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;

        let on_loan: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM borrow_requests WHERE book_id = $1 AND status = ANY($2))",
        )
        .bind(book_id)
        .bind(RequestFilter::with_statuses(&RequestStatus::ON_LOAN).status_strings())
        .fetch_one(&mut *tx)
        .await?;

        let repaired = book.available == on_loan;
        if repaired {
            sqlx::query("UPDATE books SET available = $1 WHERE id = $2")
                .bind(!on_loan)
                .bind(book_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(Reconciled {
            book: Book {
                available: !on_loan,
                ..book
            },
            repaired,
        })
    }
}
