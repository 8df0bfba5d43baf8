//! Patron (user) model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Patron role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Staff,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "staff" => Ok(Role::Staff),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Internal row structure for patron queries
#[derive(Debug, Clone, FromRow)]
pub struct PatronRow {
    id: i32,
    name: String,
    email: Option<String>,
    role: String,
}

impl From<PatronRow> for Patron {
    fn from(row: PatronRow) -> Self {
        Patron {
            id: row.id,
            name: row.name,
            email: row.email,
            role: row.role.parse().unwrap_or(Role::Student),
        }
    }
}

/// Patron as shown next to a borrow request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Patron {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
}
