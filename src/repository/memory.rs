//! In-memory ledger.
//!
//! Keeps books, requests and patrons in memory with no persistence. Used by the
//! `memory` storage backend and by tests. A single `tokio::sync::Mutex` guards all
//! tables and no operation awaits while holding it, so every store call is atomic.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{CatalogStore, LoanLedger, PatronDirectory, Reconciled, RequestStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, NewBook},
        borrow_request::{
            BorrowRequest, NewBorrowRequest, RequestFilter, RequestStatus, RequestUpdate,
            Transition,
        },
        user::{Patron, Role},
    },
};

#[derive(Debug, Default)]
struct Tables {
    books: BTreeMap<i32, Book>,
    requests: BTreeMap<i32, BorrowRequest>,
    patrons: HashMap<i32, Patron>,
    last_book_id: i32,
    last_request_id: i32,
    last_patron_id: i32,
}

impl Tables {
    fn book(&self, id: i32) -> AppResult<&Book> {
        self.books
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    fn request(&self, id: i32) -> AppResult<&BorrowRequest> {
        self.requests
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Borrow request with id {} not found", id)))
    }

    fn check_expected(&self, id: i32, expected: RequestStatus) -> AppResult<()> {
        let current = self.request(id)?.status;
        if current != expected {
            return Err(AppError::Conflict(format!(
                "Borrow request {} is {}, expected {}",
                id, current, expected
            )));
        }
        Ok(())
    }

    fn write_request(&mut self, id: i32, update: &RequestUpdate) -> AppResult<BorrowRequest> {
        let request = self
            .requests
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Borrow request with id {} not found", id)))?;

        request.status = update.status;
        if let Some(due_date) = update.due_date {
            request.due_date = Some(due_date);
        }
        request.returned = update.returned;

        Ok(request.clone())
    }

    fn matching(&self, filter: &RequestFilter) -> Vec<BorrowRequest> {
        let mut found: Vec<BorrowRequest> = self
            .requests
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        found.sort_by_key(|r| (r.requested_at, r.id));
        found
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a book to the catalog; new books are available
    pub async fn seed_book(&self, book: NewBook) -> Book {
        let mut tables = self.tables.lock().await;
        tables.last_book_id += 1;
        let book = Book {
            id: tables.last_book_id,
            title: book.title,
            author: book.author,
            category: book.category,
            available: true,
            pdf_path: book.pdf_path,
        };
        tables.books.insert(book.id, book.clone());
        book
    }

    pub async fn seed_patron(&self, name: &str, role: Role) -> Patron {
        let mut tables = self.tables.lock().await;
        tables.last_patron_id += 1;
        let patron = Patron {
            id: tables.last_patron_id,
            name: name.to_string(),
            email: None,
            role,
        };
        tables.patrons.insert(patron.id, patron.clone());
        patron
    }

    /// Insert a request in any state, bypassing the lifecycle checks.
    /// Used to load existing data such as requests awaiting a return decision.
    pub async fn seed_request(
        &self,
        book_id: i32,
        user_id: i32,
        status: RequestStatus,
        requested_at: DateTime<Utc>,
    ) -> BorrowRequest {
        let mut tables = self.tables.lock().await;
        tables.last_request_id += 1;
        let request = BorrowRequest {
            id: tables.last_request_id,
            book_id,
            user_id,
            status,
            due_date: None,
            returned: status == RequestStatus::Returned,
            requested_at,
        };
        tables.requests.insert(request.id, request.clone());
        request
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.tables.lock().await.book(id).cloned()
    }

    async fn list_books(&self) -> AppResult<Vec<Book>> {
        Ok(self.tables.lock().await.books.values().cloned().collect())
    }

    async fn set_availability(&self, id: i32, available: bool) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        let book = tables
            .books
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;
        book.available = available;
        Ok(())
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn create_request(&self, request: NewBorrowRequest) -> AppResult<BorrowRequest> {
        let mut tables = self.tables.lock().await;

        if !tables.book(request.book_id)?.available {
            return Err(AppError::Conflict("Book is not available".to_string()));
        }
        let active = tables
            .requests
            .values()
            .any(|r| r.book_id == request.book_id && r.status.is_active());
        if active {
            return Err(AppError::Conflict(
                "Book already has an active borrow request".to_string(),
            ));
        }

        tables.last_request_id += 1;
        let request = BorrowRequest {
            id: tables.last_request_id,
            book_id: request.book_id,
            user_id: request.user_id,
            status: RequestStatus::Pending,
            due_date: None,
            returned: false,
            requested_at: request.requested_at,
        };
        tables.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get_request(&self, id: i32) -> AppResult<BorrowRequest> {
        self.tables.lock().await.request(id).cloned()
    }

    async fn find_one(&self, filter: &RequestFilter) -> AppResult<BorrowRequest> {
        self.tables
            .lock()
            .await
            .matching(filter)
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("No matching borrow request".to_string()))
    }

    async fn find_many(&self, filter: &RequestFilter) -> AppResult<Vec<BorrowRequest>> {
        Ok(self.tables.lock().await.matching(filter))
    }

    async fn update_request(
        &self,
        id: i32,
        expected: RequestStatus,
        update: &RequestUpdate,
    ) -> AppResult<BorrowRequest> {
        let mut tables = self.tables.lock().await;
        tables.check_expected(id, expected)?;
        tables.write_request(id, update)
    }
}

#[async_trait]
impl LoanLedger for MemoryStore {
    async fn apply_transition(&self, transition: &Transition) -> AppResult<BorrowRequest> {
        let mut tables = self.tables.lock().await;

        // Validate both rows before touching either
        tables.check_expected(transition.request_id, transition.expected)?;
        if let Some(available) = transition.availability {
            let book = tables.book(transition.book_id)?;
            if !available && !book.available {
                return Err(AppError::Conflict(format!(
                    "Book {} is already on loan",
                    transition.book_id
                )));
            }
        }

        let request = tables.write_request(transition.request_id, &transition.update)?;
        if let Some(available) = transition.availability {
            if let Some(book) = tables.books.get_mut(&transition.book_id) {
                book.available = available;
            }
        }

        Ok(request)
    }

    async fn reconcile_availability(&self, book_id: i32) -> AppResult<Reconciled> {
        let mut tables = self.tables.lock().await;

        let on_loan = tables
            .requests
            .values()
            .any(|r| r.book_id == book_id && r.status.is_on_loan());
        let book = tables
            .books
            .get_mut(&book_id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;

        let repaired = book.available == on_loan;
        book.available = !on_loan;

        Ok(Reconciled {
            book: book.clone(),
            repaired,
        })
    }
}

#[async_trait]
impl PatronDirectory for MemoryStore {
    async fn find_patron(&self, id: i32) -> AppResult<Option<Patron>> {
        Ok(self.tables.lock().await.patrons.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_create_request_checks_book() {
        let store = MemoryStore::new();
        let book = store.seed_book(NewBook::new("Dune", "Herbert", "SF")).await;

        let missing = store
            .create_request(NewBorrowRequest {
                book_id: book.id + 1,
                user_id: 1,
                requested_at: Utc::now(),
            })
            .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        store.set_availability(book.id, false).await.unwrap();
        let unavailable = store
            .create_request(NewBorrowRequest {
                book_id: book.id,
                user_id: 1,
                requested_at: Utc::now(),
            })
            .await;
        assert!(matches!(unavailable, Err(AppError::Conflict(_))));
        assert!(store
            .find_many(&RequestFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_second_active_request_is_refused() {
        let store = MemoryStore::new();
        let book = store.seed_book(NewBook::new("Dune", "Herbert", "SF")).await;
        let new = NewBorrowRequest {
            book_id: book.id,
            user_id: 1,
            requested_at: Utc::now(),
        };

        store.create_request(new.clone()).await.unwrap();
        let second = store
            .create_request(NewBorrowRequest { user_id: 2, ..new })
            .await;
        assert!(matches!(second, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_find_many_orders_by_requested_at() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let later = store
            .seed_request(1, 1, RequestStatus::Pending, now)
            .await;
        let earlier = store
            .seed_request(2, 1, RequestStatus::Pending, now - Duration::minutes(5))
            .await;

        let found = store
            .find_many(&RequestFilter::with_statuses(&[RequestStatus::Pending]))
            .await
            .unwrap();
        assert_eq!(
            found.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![earlier.id, later.id]
        );
        assert_eq!(
            store
                .find_one(&RequestFilter::default().patron(1))
                .await
                .unwrap()
                .id,
            earlier.id
        );
    }

    #[tokio::test]
    async fn test_apply_transition_is_all_or_nothing() {
        let store = MemoryStore::new();
        let book = store.seed_book(NewBook::new("Dune", "Herbert", "SF")).await;
        let request = store
            .seed_request(book.id, 1, RequestStatus::Pending, Utc::now())
            .await;
        store.set_availability(book.id, false).await.unwrap();

        let transition = request
            .plan(crate::models::LoanAction::ApproveBorrow, chrono::Local::now())
            .unwrap();
        let result = store.apply_transition(&transition).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(
            store.get_request(request.id).await.unwrap().status,
            RequestStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_update_request_is_compare_and_set() {
        let store = MemoryStore::new();
        let request = store
            .seed_request(1, 1, RequestStatus::Approved, Utc::now())
            .await;
        let update = RequestUpdate {
            status: RequestStatus::Rejected,
            due_date: None,
            returned: false,
        };

        let stale = store
            .update_request(request.id, RequestStatus::Pending, &update)
            .await;
        assert!(matches!(stale, Err(AppError::Conflict(_))));

        let missing = store
            .update_request(request.id + 10, RequestStatus::Pending, &update)
            .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_reconcile_availability_repairs_only_drift() {
        let store = MemoryStore::new();
        let lent = store.seed_book(NewBook::new("Dune", "Herbert", "SF")).await;
        let idle = store.seed_book(NewBook::new("Emma", "Austen", "Classics")).await;
        store
            .seed_request(lent.id, 1, RequestStatus::ReturnRejected, Utc::now())
            .await;

        let repaired = store.reconcile_availability(lent.id).await.unwrap();
        assert!(repaired.repaired);
        assert!(!repaired.book.available);
        assert!(!store.get_book(lent.id).await.unwrap().available);

        let untouched = store.reconcile_availability(idle.id).await.unwrap();
        assert!(!untouched.repaired);
        assert!(untouched.book.available);

        let missing = store.reconcile_availability(idle.id + 10).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }
}
