//! Business logic services

pub mod catalog;
pub mod loans;

use std::future::Future;
use std::time::Duration;

use crate::{
    config::LendingConfig,
    error::{AppError, AppResult},
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, lending: &LendingConfig) -> Self {
        Self {
            catalog: catalog::CatalogService::new(repository.clone(), lending.store_timeout()),
            loans: loans::LoansService::new(repository, lending.store_timeout()),
        }
    }
}

/// Run one store call with an upper bound on how long it may take.
///
/// Store futures are dropped on timeout; stores keep each call atomic, so an
/// abandoned call either committed fully or not at all.
pub(crate) async fn bounded<T, F>(limit: Duration, operation: &str, call: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("Store call {} timed out after {:?}", operation, limit);
            Err(AppError::Timeout(format!(
                "{} did not complete within {:?}",
                operation, limit
            )))
        }
    }
}
