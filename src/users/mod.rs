//! User records and capability lookup
//!
//! Keys and sessions are bound to a user; conversions require the
//! `can_generate_pdf` capability.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::Result;

/// A user that keys and sessions can be bound to
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub active: bool,
    pub can_generate_pdf: bool,
}

/// Repository for user persistence
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new repository
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a user by ID
    pub async fn get(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, active, can_generate_pdf FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Get a user that is still allowed to hold a session
    ///
    /// Returns `None` for missing or deactivated users so callers can map
    /// both cases to the same failure.
    pub async fn get_active(&self, id: i64) -> Result<Option<User>> {
        Ok(self.get(id).await?.filter(|u| u.active))
    }

    /// Create a user, returning the assigned ID
    pub async fn create(&self, username: &str, can_generate_pdf: bool) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO users (username, active, can_generate_pdf) VALUES (?, 1, ?)",
        )
        .bind(username)
        .bind(can_generate_pdf)
        .execute(self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Deactivate a user; existing keys for the user stop resolving to a login
    pub async fn deactivate(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET active = 0 WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
