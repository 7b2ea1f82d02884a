//! SQLite storage for sessions

use sqlx::SqlitePool;

use crate::error::Result;

/// An authenticated session established by key login
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    pub instance: i64,
    /// Always true for sessions this service creates; recorded so audit
    /// trails can tell key logins apart from any interactive scheme.
    pub key_login: bool,
    /// Absolute expiry, unix seconds; the reaper deletes the row past this
    pub valid_until: i64,
    pub created_at: String,
}

/// Repository for session persistence
pub struct SessionStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SessionStore<'a> {
    /// Create a new store
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a session row
    pub async fn insert(&self, user_id: i64, instance: i64, valid_until: i64) -> Result<Session> {
        let id = uuid::Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO sessions (id, user_id, instance, key_login, valid_until) VALUES (?, ?, ?, 1, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(instance)
        .bind(valid_until)
        .execute(self.pool)
        .await?;

        let session = sqlx::query_as::<_, Session>(
            "SELECT id, user_id, instance, key_login, valid_until, created_at FROM sessions WHERE id = ?",
        )
        .bind(&id)
        .fetch_one(self.pool)
        .await?;

        Ok(session)
    }

    /// Look up a session by id
    pub async fn get(&self, id: &str) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT id, user_id, instance, key_login, valid_until, created_at FROM sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(session)
    }

    /// Delete a session; idempotent
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every session bound to an instance
    pub async fn delete_for_instance(&self, instance: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE instance = ?")
            .bind(instance)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Reap sessions that outlived their expiry without being terminated
    pub async fn purge_expired(&self, now: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE valid_until < ?")
            .bind(now)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    fn expiry() -> i64 {
        chrono::Utc::now().timestamp() + 60
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let pool = create_test_pool().await;
        let store = SessionStore::new(&pool);

        let valid_until = expiry();
        let session = store.insert(7, 42, valid_until).await.unwrap();
        assert!(session.key_login);

        let loaded = store.get(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.user_id, 7);
        assert_eq!(loaded.instance, 42);
        assert_eq!(loaded.valid_until, valid_until);
    }

    #[tokio::test]
    async fn test_delete_for_instance() {
        let pool = create_test_pool().await;
        let store = SessionStore::new(&pool);

        store.insert(7, 42, expiry()).await.unwrap();
        store.insert(8, 42, expiry()).await.unwrap();
        let other = store.insert(7, 99, expiry()).await.unwrap();

        let deleted = store.delete_for_instance(42).await.unwrap();
        assert_eq!(deleted, 2);
        assert!(store.get(&other.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let pool = create_test_pool().await;
        let store = SessionStore::new(&pool);

        let now = chrono::Utc::now().timestamp();
        let stale = store.insert(7, 42, now - 1).await.unwrap();
        let live = store.insert(8, 42, now + 60).await.unwrap();

        let purged = store.purge_expired(now).await.unwrap();
        assert_eq!(purged, 1);

        assert!(store.get(&stale.id).await.unwrap().is_none());
        assert!(store.get(&live.id).await.unwrap().is_some());
    }
}
