//! Loan lifecycle service.
//!
//! Owns the rules tying a borrow request's status to its book's availability:
//! a book is lent only by approving its single pending request, and freed only by
//! returning it. Each operation plans its change with the state machine in
//! [`crate::models::borrow_request`] and commits it in one store call, so
//! concurrent callers racing on the same request or book see exactly one winner.

use std::time::Duration;

use chrono::{Local, Utc};

use super::bounded;
use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        borrow_request::{
            BorrowRequest, BorrowRequestDetails, Decision, LoanAction, NewBorrowRequest,
            RequestFilter, RequestStatus,
        },
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    store_timeout: Duration,
}

/// Treat `NotFound` as an empty join instead of an error
fn found<T>(result: AppResult<T>) -> AppResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(AppError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

impl LoansService {
    pub fn new(repository: Repository, store_timeout: Duration) -> Self {
        Self {
            repository,
            store_timeout,
        }
    }

    /// Ask to borrow a book. The request starts `pending`; the book stays
    /// available until staff approve it.
    pub async fn create_borrow_request(&self, book_id: i32, user_id: i32) -> AppResult<BorrowRequest> {
        let new = NewBorrowRequest {
            book_id,
            user_id,
            requested_at: Utc::now(),
        };

        let request = bounded(
            self.store_timeout,
            "create_request",
            self.repository.ledger.create_request(new),
        )
        .await?;

        tracing::info!(
            "Borrow request {} created: book={} patron={}",
            request.id,
            book_id,
            user_id
        );
        Ok(request)
    }

    /// Approve or reject a pending borrow request
    pub async fn decide_borrow_request(
        &self,
        request_id: i32,
        decision: Decision,
    ) -> AppResult<BorrowRequest> {
        let request = self.get_request(request_id).await?;
        self.transition(request, decision.borrow_action()).await
    }

    /// Patron returns a book they hold. Completes immediately, without a staff
    /// decision.
    pub async fn request_return(&self, book_id: i32, user_id: i32) -> AppResult<BorrowRequest> {
        let filter = RequestFilter::with_statuses(&RequestStatus::RETURNABLE)
            .book(book_id)
            .patron(user_id);

        let mut loans = bounded(
            self.store_timeout,
            "find_many",
            self.repository.ledger.find_many(&filter),
        )
        .await?;

        let request = match loans.len() {
            0 => {
                return Err(AppError::NotFound(
                    "No approved borrow request found for this book".to_string(),
                ))
            }
            1 => loans.remove(0),
            n => {
                return Err(AppError::Conflict(format!(
                    "{} approved borrow requests match book {} and patron {}",
                    n, book_id, user_id
                )))
            }
        };

        self.transition(request, LoanAction::Return).await
    }

    /// Approve or reject a request awaiting a return decision
    pub async fn decide_return_request(
        &self,
        request_id: i32,
        decision: Decision,
    ) -> AppResult<BorrowRequest> {
        let request = self.get_request(request_id).await?;
        self.transition(request, decision.return_action()).await
    }

    /// Get a single request with its book and patron
    pub async fn get_request_details(&self, request_id: i32) -> AppResult<BorrowRequestDetails> {
        let request = self.get_request(request_id).await?;
        self.details(request).await
    }

    /// Borrow requests awaiting a decision
    pub async fn list_pending_borrow_requests(&self) -> AppResult<Vec<BorrowRequestDetails>> {
        self.list(RequestFilter::with_statuses(&[RequestStatus::Pending]))
            .await
    }

    /// Return requests awaiting a decision
    pub async fn list_pending_return_requests(&self) -> AppResult<Vec<BorrowRequestDetails>> {
        self.list(RequestFilter::with_statuses(&[RequestStatus::PendingReturn]))
            .await
    }

    /// A patron's pending borrow requests; `NotFound` when there are none
    pub async fn list_patron_pending_requests(
        &self,
        user_id: i32,
    ) -> AppResult<Vec<BorrowRequestDetails>> {
        let requests = self
            .list(RequestFilter::with_statuses(&[RequestStatus::Pending]).patron(user_id))
            .await?;

        if requests.is_empty() {
            return Err(AppError::NotFound(
                "No pending borrow requests found".to_string(),
            ));
        }
        Ok(requests)
    }

    /// Books a patron currently holds
    pub async fn list_patron_borrowed(&self, user_id: i32) -> AppResult<Vec<BorrowRequestDetails>> {
        self.list(RequestFilter::with_statuses(&RequestStatus::ON_LOAN).patron(user_id))
            .await
    }

    /// Recompute a book's availability from its requests and repair it if it drifted
    pub async fn reconcile_availability(&self, book_id: i32) -> AppResult<Book> {
        let reconciled = bounded(
            self.store_timeout,
            "reconcile_availability",
            self.repository.ledger.reconcile_availability(book_id),
        )
        .await?;

        if reconciled.repaired {
            tracing::warn!(
                "Book {} availability drifted, repaired to available={}",
                book_id,
                reconciled.book.available
            );
        }

        Ok(reconciled.book)
    }

    async fn get_request(&self, request_id: i32) -> AppResult<BorrowRequest> {
        bounded(
            self.store_timeout,
            "get_request",
            self.repository.ledger.get_request(request_id),
        )
        .await
    }

    /// Plan `action` against `request` and commit it
    async fn transition(&self, request: BorrowRequest, action: LoanAction) -> AppResult<BorrowRequest> {
        let plan = request.plan(action, Local::now())?;
        let ledger = &self.repository.ledger;

        let updated = match plan.availability {
            Some(_) => {
                bounded(
                    self.store_timeout,
                    "apply_transition",
                    ledger.apply_transition(&plan),
                )
                .await?
            }
            None => {
                bounded(
                    self.store_timeout,
                    "update_request",
                    ledger.update_request(plan.request_id, plan.expected, &plan.update),
                )
                .await?
            }
        };

        tracing::info!(
            "Borrow request {}: {} -> {} (book={}, available={:?})",
            updated.id,
            plan.expected,
            updated.status,
            updated.book_id,
            plan.availability
        );
        Ok(updated)
    }

    async fn list(&self, filter: RequestFilter) -> AppResult<Vec<BorrowRequestDetails>> {
        let requests = bounded(
            self.store_timeout,
            "find_many",
            self.repository.ledger.find_many(&filter),
        )
        .await?;

        let mut details = Vec::with_capacity(requests.len());
        for request in requests {
            details.push(self.details(request).await?);
        }
        Ok(details)
    }

    async fn details(&self, request: BorrowRequest) -> AppResult<BorrowRequestDetails> {
        let book = found(
            bounded(
                self.store_timeout,
                "get_book",
                self.repository.ledger.get_book(request.book_id),
            )
            .await,
        )?;
        let patron = bounded(
            self.store_timeout,
            "find_patron",
            self.repository.patrons.find_patron(request.user_id),
        )
        .await?;

        Ok(BorrowRequestDetails {
            request,
            book,
            patron,
        })
    }
}
