//! Libris lending server
//!
//! Tracks the borrow lifecycle of library books: patrons ask to borrow, staff
//! approve or reject, patrons return. Exposed as a REST JSON API over either a
//! PostgreSQL or an in-memory store.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
