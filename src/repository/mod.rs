//! Repository layer: store contracts consumed by the lending services and
//! their Postgres and in-memory implementations.
//!
//! The lifecycle manager never talks to a database directly. It reads books
//! through [`CatalogStore`], requests through [`RequestStore`], and commits
//! every change that touches both through [`LoanLedger::apply_transition`],
//! which implementations must make atomic.

pub mod books;
pub mod borrow_requests;
pub mod memory;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        book::Book,
        borrow_request::{BorrowRequest, NewBorrowRequest, RequestFilter, RequestStatus, RequestUpdate, Transition},
        user::Patron,
    },
};

pub use memory::MemoryStore;
pub use users::UsersRepository;

/// Book lookups and availability changes
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// `NotFound` if the book does not exist
    async fn get_book(&self, id: i32) -> AppResult<Book>;

    /// All books, by id
    async fn list_books(&self) -> AppResult<Vec<Book>>;

    /// Unconditional write of the availability flag. `NotFound` if the book does not exist.
    async fn set_availability(&self, id: i32, available: bool) -> AppResult<()>;
}

/// Borrow request persistence
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Insert a `pending` request.
    ///
    /// Fails with `NotFound` if the book does not exist and with `Conflict` if it is
    /// unavailable or already has an active request. The check and the insert are
    /// atomic with respect to other creates for the same book.
    async fn create_request(&self, request: NewBorrowRequest) -> AppResult<BorrowRequest>;

    /// `NotFound` if the request does not exist
    async fn get_request(&self, id: i32) -> AppResult<BorrowRequest>;

    /// First match in `requested_at` order, `NotFound` if there is none
    async fn find_one(&self, filter: &RequestFilter) -> AppResult<BorrowRequest>;

    /// All matches in `requested_at` order
    async fn find_many(&self, filter: &RequestFilter) -> AppResult<Vec<BorrowRequest>>;

    /// Update a request that is still in `expected`; `Conflict` if it moved on,
    /// `NotFound` if it does not exist.
    async fn update_request(
        &self,
        id: i32,
        expected: RequestStatus,
        update: &RequestUpdate,
    ) -> AppResult<BorrowRequest>;
}

/// A store holding both books and requests, able to change them together
#[async_trait]
pub trait LoanLedger: CatalogStore + RequestStore {
    /// Commit a transition: the request update and the availability change land
    /// together or not at all.
    ///
    /// Refused with `Conflict` when the request is no longer in
    /// `transition.expected` or when the book is being lent while already
    /// unavailable; `NotFound` when either row is missing.
    async fn apply_transition(&self, transition: &Transition) -> AppResult<BorrowRequest>;

    /// Recompute a book's `available` flag from its on-loan requests and write it
    /// back if it drifted. Read and repair are atomic with respect to transitions
    /// on the same book. `NotFound` if the book does not exist.
    async fn reconcile_availability(&self, book_id: i32) -> AppResult<Reconciled>;
}

/// Outcome of [`LoanLedger::reconcile_availability`]
#[derive(Debug, Clone)]
pub struct Reconciled {
    /// The book as it stands after the repair
    pub book: Book,
    /// Whether the stored flag was wrong and had to be rewritten
    pub repaired: bool,
}

/// Patron lookups for display joins
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PatronDirectory: Send + Sync {
    async fn find_patron(&self, id: i32) -> AppResult<Option<Patron>>;
}

/// Postgres-backed ledger for books and borrow requests
#[derive(Clone)]
pub struct PgLedger {
    pool: Pool<Postgres>,
}

impl PgLedger {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Main repository struct holding the configured stores
#[derive(Clone)]
pub struct Repository {
    pub ledger: Arc<dyn LoanLedger>,
    pub patrons: Arc<dyn PatronDirectory>,
}

impl Repository {
    pub fn new(ledger: Arc<dyn LoanLedger>, patrons: Arc<dyn PatronDirectory>) -> Self {
        Self { ledger, patrons }
    }

    /// Repository backed by the given database pool
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            ledger: Arc::new(PgLedger::new(pool.clone())),
            patrons: Arc::new(UsersRepository::new(pool)),
        }
    }

    /// Repository backed by a single in-memory store
    pub fn in_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            ledger: store.clone(),
            patrons: store,
        }
    }
}
