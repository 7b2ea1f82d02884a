//! SQLite storage for access keys

use sqlx::SqlitePool;

use super::KEY_SCOPE;
use crate::error::Result;

/// A stored access key record
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccessKey {
    pub value: String,
    pub script: String,
    pub user_id: i64,
    pub instance: i64,
    pub ip_restriction: Option<String>,
    /// Absolute expiry, unix seconds
    pub valid_until: i64,
}

/// Repository for access key persistence
pub struct KeyStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> KeyStore<'a> {
    /// Create a new store
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a key record
    pub async fn insert(&self, key: &AccessKey) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO access_keys (value, script, user_id, instance, ip_restriction, valid_until)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&key.value)
        .bind(&key.script)
        .bind(key.user_id)
        .bind(key.instance)
        .bind(&key.ip_restriction)
        .bind(key.valid_until)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Consume a key: delete it and return the record if one existed.
    ///
    /// This single statement is the single-use enforcement point. Two
    /// concurrent exchanges of the same token race on the delete and
    /// exactly one gets the row back; there is no check-then-delete
    /// window.
    pub async fn take(&self, value: &str, instance: i64) -> Result<Option<AccessKey>> {
        let key = sqlx::query_as::<_, AccessKey>(
            r#"
            DELETE FROM access_keys
            WHERE value = ? AND script = ? AND instance = ?
            RETURNING value, script, user_id, instance, ip_restriction, valid_until
            "#,
        )
        .bind(value)
        .bind(KEY_SCOPE)
        .bind(instance)
        .fetch_optional(self.pool)
        .await?;

        Ok(key)
    }

    /// Delete the key for a (user, instance) tuple; idempotent
    pub async fn delete_for(&self, user_id: i64, instance: i64) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM access_keys WHERE script = ? AND user_id = ? AND instance = ?",
        )
        .bind(KEY_SCOPE)
        .bind(user_id)
        .bind(instance)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Reap keys that expired without being consumed
    pub async fn purge_expired(&self, now: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM access_keys WHERE valid_until < ?")
            .bind(now)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Count keys for a (user, instance) tuple
    pub async fn count_for(&self, user_id: i64, instance: i64) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM access_keys WHERE script = ? AND user_id = ? AND instance = ?",
        )
        .bind(KEY_SCOPE)
        .bind(user_id)
        .bind(instance)
        .fetch_one(self.pool)
        .await?;

        Ok(row.0)
    }
}
