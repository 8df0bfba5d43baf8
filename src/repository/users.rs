//! Users (patrons) repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::PatronDirectory;
use crate::{
    error::AppResult,
    models::user::{Patron, PatronRow},
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PatronDirectory for UsersRepository {
    async fn find_patron(&self, id: i32) -> AppResult<Option<Patron>> {
        let row = sqlx::query_as::<_, PatronRow>(
            "SELECT id, name, email, role FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Patron::from))
    }
}
