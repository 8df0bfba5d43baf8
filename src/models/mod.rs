//! Data models for Libris

pub mod book;
pub mod borrow_request;
pub mod user;

// Re-export commonly used types
pub use book::{Book, NewBook};
pub use borrow_request::{
    BorrowRequest, BorrowRequestDetails, Decision, LoanAction, RequestFilter, RequestStatus,
    Transition,
};
pub use user::{Patron, Role};
