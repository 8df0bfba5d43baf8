//! Borrow request model and the lending state machine.
//!
//! A request moves through a fixed set of states:
//!
//! ```text
//! Pending ──approve──> Approved ──return──────────────> Returned
//!    │                    :                                ^
//!    └──reject──> Rejected :                               │
//!                          v                               │
//!                   PendingReturn ──approve return─────────┘
//!                          └──reject return──> ReturnRejected ──return──> Returned
//! ```
//!
//! Nothing in the lending API moves a request from `Approved` to `PendingReturn`;
//! patron returns go straight to `Returned`. `PendingReturn` rows only come from
//! existing data, and staff resolve them through the return-decision endpoint.
//!
//! Every change goes through [`RequestStatus::apply`], which rejects transitions
//! that are not in the table, and [`BorrowRequest::plan`], which derives the full
//! [`Transition`] (new status, due date, availability change) the store commits
//! atomically.

use chrono::{DateTime, Days, Local, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::{book::Book, user::Patron};
use crate::error::{AppError, AppResult};

/// Loan period granted on approval, in calendar days
pub const LOAN_PERIOD_DAYS: u64 = 14;

/// Borrow request lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    PendingReturn,
    Returned,
    ReturnRejected,
}

impl RequestStatus {
    /// States that hold a book: a second request for the same book is refused
    /// while one of these exists.
    pub const ACTIVE: [RequestStatus; 4] = [
        RequestStatus::Pending,
        RequestStatus::Approved,
        RequestStatus::PendingReturn,
        RequestStatus::ReturnRejected,
    ];

    /// States in which the patron has the book
    pub const ON_LOAN: [RequestStatus; 3] = [
        RequestStatus::Approved,
        RequestStatus::PendingReturn,
        RequestStatus::ReturnRejected,
    ];

    /// States a patron may return a book from
    pub const RETURNABLE: [RequestStatus; 2] =
        [RequestStatus::Approved, RequestStatus::ReturnRejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::PendingReturn => "pending-return",
            RequestStatus::Returned => "returned",
            RequestStatus::ReturnRejected => "return-rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Rejected | RequestStatus::Returned)
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_on_loan(&self) -> bool {
        Self::ON_LOAN.contains(self)
    }

    /// Transition table. Anything not listed here is refused.
    pub fn apply(self, action: LoanAction) -> AppResult<RequestStatus> {
        use LoanAction::*;
        use RequestStatus::*;

        match (self, action) {
            (Pending, ApproveBorrow) => Ok(Approved),
            (Pending, RejectBorrow) => Ok(Rejected),
            (Approved | ReturnRejected, Return) => Ok(Returned),
            (PendingReturn, ApproveReturn) => Ok(Returned),
            (PendingReturn, RejectReturn) => Ok(ReturnRejected),
            (from, _) if from.is_terminal() => Err(AppError::Conflict(format!(
                "Borrow request is already {}",
                from
            ))),
            (from, action) => Err(AppError::Conflict(format!(
                "Cannot {} a request that is {}",
                action.verb(),
                from
            ))),
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            "pending-return" => Ok(RequestStatus::PendingReturn),
            "returned" => Ok(RequestStatus::Returned),
            "return-rejected" => Ok(RequestStatus::ReturnRejected),
            _ => Err(format!("Invalid request status: {}", s)),
        }
    }
}

/// Something that can happen to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanAction {
    ApproveBorrow,
    RejectBorrow,
    /// Patron hands the book back
    Return,
    ApproveReturn,
    RejectReturn,
}

impl LoanAction {
    /// New value of the book's `available` flag, if the action changes it
    pub fn availability(self) -> Option<bool> {
        match self {
            LoanAction::ApproveBorrow => Some(false),
            LoanAction::Return | LoanAction::ApproveReturn => Some(true),
            LoanAction::RejectBorrow | LoanAction::RejectReturn => None,
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            LoanAction::ApproveBorrow => "approve",
            LoanAction::RejectBorrow => "reject",
            LoanAction::Return => "return",
            LoanAction::ApproveReturn => "approve the return of",
            LoanAction::RejectReturn => "reject the return of",
        }
    }
}

/// Staff decision on a borrow or return request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn borrow_action(self) -> LoanAction {
        match self {
            Decision::Approved => LoanAction::ApproveBorrow,
            Decision::Rejected => LoanAction::RejectBorrow,
        }
    }

    pub fn return_action(self) -> LoanAction {
        match self {
            Decision::Approved => LoanAction::ApproveReturn,
            Decision::Rejected => LoanAction::RejectReturn,
        }
    }
}

impl std::str::FromStr for Decision {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(Decision::Approved),
            "rejected" => Ok(Decision::Rejected),
            _ => Err(AppError::Validation(format!(
                "Invalid status '{}': expected \"approved\" or \"rejected\"",
                s
            ))),
        }
    }
}

/// Borrow request as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BorrowRequest {
    pub id: i32,
    pub book_id: i32,
    pub user_id: i32,
    pub status: RequestStatus,
    /// Set when the borrow is approved
    pub due_date: Option<DateTime<Utc>>,
    pub returned: bool,
    pub requested_at: DateTime<Utc>,
}

/// Internal row structure for borrow request queries
#[derive(Debug, Clone, FromRow)]
pub struct BorrowRequestRow {
    id: i32,
    book_id: i32,
    user_id: i32,
    status: String,
    due_date: Option<DateTime<Utc>>,
    returned: bool,
    requested_at: DateTime<Utc>,
}

impl TryFrom<BorrowRequestRow> for BorrowRequest {
    type Error = AppError;

    fn try_from(row: BorrowRequestRow) -> Result<Self, Self::Error> {
        Ok(BorrowRequest {
            id: row.id,
            book_id: row.book_id,
            user_id: row.user_id,
            status: row.status.parse().map_err(AppError::Internal)?,
            due_date: row.due_date,
            returned: row.returned,
            requested_at: row.requested_at,
        })
    }
}

impl BorrowRequest {
    /// Work out what `action` does to this request and its book.
    ///
    /// `now` is the deciding process's local clock; due dates are counted in
    /// local calendar days from it.
    pub fn plan(&self, action: LoanAction, now: DateTime<Local>) -> AppResult<Transition> {
        let status = self.status.apply(action)?;

        let due_date = match action {
            LoanAction::ApproveBorrow => Some(compute_due_date(now)?),
            _ => None,
        };

        Ok(Transition {
            request_id: self.id,
            book_id: self.book_id,
            expected: self.status,
            update: RequestUpdate {
                status,
                due_date,
                returned: status == RequestStatus::Returned,
            },
            availability: action.availability(),
        })
    }
}

/// Due date for a borrow approved at `approved_at`
pub fn compute_due_date(approved_at: DateTime<Local>) -> AppResult<DateTime<Utc>> {
    approved_at
        .checked_add_days(Days::new(LOAN_PERIOD_DAYS))
        .map(|d| d.with_timezone(&Utc))
        .ok_or_else(|| AppError::Internal(format!("Due date out of range for {}", approved_at)))
}

/// Request to insert
#[derive(Debug, Clone)]
pub struct NewBorrowRequest {
    pub book_id: i32,
    pub user_id: i32,
    pub requested_at: DateTime<Utc>,
}

/// Field changes applied to a request by a transition.
/// A `None` due date leaves the stored value untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUpdate {
    pub status: RequestStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub returned: bool,
}

/// A planned change to one request and, optionally, its book.
///
/// Stores commit it only if the request is still in `expected`, and apply the
/// request update and the availability change together or not at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub request_id: i32,
    pub book_id: i32,
    pub expected: RequestStatus,
    pub update: RequestUpdate,
    pub availability: Option<bool>,
}

/// Selection of requests; empty fields match everything
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub book_id: Option<i32>,
    pub user_id: Option<i32>,
    pub statuses: Vec<RequestStatus>,
}

impl RequestFilter {
    pub fn with_statuses(statuses: &[RequestStatus]) -> Self {
        Self {
            statuses: statuses.to_vec(),
            ..Default::default()
        }
    }

    pub fn book(mut self, book_id: i32) -> Self {
        self.book_id = Some(book_id);
        self
    }

    pub fn patron(mut self, user_id: i32) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn matches(&self, request: &BorrowRequest) -> bool {
        self.book_id.map_or(true, |id| request.book_id == id)
            && self.user_id.map_or(true, |id| request.user_id == id)
            && (self.statuses.is_empty() || self.statuses.contains(&request.status))
    }

    pub fn status_strings(&self) -> Vec<String> {
        self.statuses.iter().map(|s| s.as_str().to_string()).collect()
    }
}

/// Borrow request with its book and patron, for display
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BorrowRequestDetails {
    #[serde(flatten)]
    pub request: BorrowRequest,
    /// `None` when the book no longer exists in the catalog
    pub book: Option<Book>,
    /// `None` when the patron is unknown
    pub patron: Option<Patron>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request(status: RequestStatus) -> BorrowRequest {
        BorrowRequest {
            id: 7,
            book_id: 3,
            user_id: 11,
            status,
            due_date: None,
            returned: false,
            requested_at: Utc::now(),
        }
    }

    #[test]
    fn test_terminal_states_refuse_every_action() {
        let actions = [
            LoanAction::ApproveBorrow,
            LoanAction::RejectBorrow,
            LoanAction::Return,
            LoanAction::ApproveReturn,
            LoanAction::RejectReturn,
        ];
        for status in [RequestStatus::Rejected, RequestStatus::Returned] {
            assert!(status.is_terminal());
            for action in actions {
                assert!(
                    matches!(status.apply(action), Err(AppError::Conflict(_))),
                    "{} accepted {:?}",
                    status,
                    action
                );
            }
        }
    }

    #[test]
    fn test_terminal_conflict_names_final_state() {
        let err = RequestStatus::Returned.apply(LoanAction::Return).unwrap_err();
        assert_eq!(err.to_string(), "Conflict: Borrow request is already returned");
    }

    #[test]
    fn test_pending_cannot_be_returned() {
        assert!(RequestStatus::Pending.apply(LoanAction::Return).is_err());
        assert!(RequestStatus::Pending.apply(LoanAction::ApproveReturn).is_err());
    }

    #[test]
    fn test_approved_cannot_be_approved_twice() {
        let err = RequestStatus::Approved
            .apply(LoanAction::ApproveBorrow)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Conflict: Cannot approve a request that is approved"
        );
    }

    #[test]
    fn test_return_rejected_stays_on_loan_and_can_be_returned() {
        assert!(RequestStatus::ReturnRejected.is_on_loan());
        assert_eq!(
            RequestStatus::ReturnRejected.apply(LoanAction::Return).unwrap(),
            RequestStatus::Returned
        );
    }

    #[test]
    fn test_plan_approval_sets_due_date_and_locks_book() {
        let now = Local.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap();
        let transition = request(RequestStatus::Pending)
            .plan(LoanAction::ApproveBorrow, now)
            .unwrap();

        assert_eq!(transition.expected, RequestStatus::Pending);
        assert_eq!(transition.update.status, RequestStatus::Approved);
        assert_eq!(transition.availability, Some(false));
        assert!(!transition.update.returned);

        let due = transition.update.due_date.unwrap().with_timezone(&Local);
        assert_eq!(due, Local.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap());
    }

    #[test]
    fn test_plan_rejection_leaves_book_alone() {
        let transition = request(RequestStatus::Pending)
            .plan(LoanAction::RejectBorrow, Local::now())
            .unwrap();
        assert_eq!(transition.update.status, RequestStatus::Rejected);
        assert_eq!(transition.availability, None);
        assert_eq!(transition.update.due_date, None);
    }

    #[test]
    fn test_plan_return_marks_returned_and_frees_book() {
        let transition = request(RequestStatus::Approved)
            .plan(LoanAction::Return, Local::now())
            .unwrap();
        assert_eq!(transition.update.status, RequestStatus::Returned);
        assert!(transition.update.returned);
        assert_eq!(transition.availability, Some(true));
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_value(RequestStatus::PendingReturn).unwrap(),
            "pending-return"
        );
        assert_eq!(
            "return-rejected".parse::<RequestStatus>(),
            Ok(RequestStatus::ReturnRejected)
        );
        assert!("Pending".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn test_decision_parse() {
        assert_eq!("approved".parse::<Decision>().unwrap(), Decision::Approved);
        assert!(matches!(
            "maybe".parse::<Decision>(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_filter_matching() {
        let filter = RequestFilter::with_statuses(&RequestStatus::ON_LOAN).patron(11);
        assert!(filter.matches(&request(RequestStatus::Approved)));
        assert!(!filter.matches(&request(RequestStatus::Pending)));
        assert!(!filter.clone().book(4).matches(&request(RequestStatus::Approved)));
        assert!(RequestFilter::default().matches(&request(RequestStatus::Returned)));
    }
}
