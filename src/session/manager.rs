//! Exchange of access keys for sessions, and session teardown

use std::net::IpAddr;

use sqlx::SqlitePool;

use super::{Session, SessionStore};
use crate::error::{AppError, Result};
use crate::keys::KeyManager;
use crate::users::UserRepository;

/// Manager for key logins
pub struct SessionManager<'a> {
    pool: &'a SqlitePool,
    store: SessionStore<'a>,
    key_ttl_seconds: i64,
}

impl<'a> SessionManager<'a> {
    /// Create a new manager
    pub fn new(pool: &'a SqlitePool, key_ttl_seconds: i64) -> Self {
        Self {
            pool,
            store: SessionStore::new(pool),
            key_ttl_seconds,
        }
    }

    /// Log a user in with a single-use access key.
    ///
    /// The key is destroyed before any session side effect, so a failure
    /// later in the exchange can never leave a live key behind. The
    /// returned session is bound to the key's user only; it carries no
    /// further privileges, and it expires on the key's TTL in case
    /// nothing terminates it explicitly.
    pub async fn login_with_key(
        &self,
        token: &str,
        instance: i64,
        origin: Option<IpAddr>,
    ) -> Result<Session> {
        let keys = KeyManager::new(self.pool, self.key_ttl_seconds);
        let key = keys.consume_key(token, instance, origin).await?;

        let user = UserRepository::new(self.pool)
            .get_active(key.user_id)
            .await?
            .ok_or(AppError::InvalidUser(key.user_id))?;

        let valid_until = chrono::Utc::now().timestamp() + self.key_ttl_seconds;
        let session = self.store.insert(user.id, instance, valid_until).await?;

        tracing::info!(
            user_id = user.id,
            instance,
            session_id = %session.id,
            "Key login established session"
        );

        Ok(session)
    }

    /// Destroy a session entirely
    pub async fn terminate(&self, session_id: &str) -> Result<bool> {
        self.store.delete(session_id).await
    }

    /// Destroy every session a conversion's proxy exchange created.
    ///
    /// Called on every exit path of a conversion, success or not, so the
    /// token-derived identity cannot outlive the render.
    pub async fn terminate_for_instance(&self, instance: i64) -> Result<u64> {
        let terminated = self.store.delete_for_instance(instance).await?;
        if terminated > 0 {
            tracing::debug!(instance, terminated, "Terminated key-login sessions");
        }

        Ok(terminated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::keys::KeyManager;
    use crate::users::{User, UserRepository};

    async fn test_user(pool: &SqlitePool) -> User {
        let repo = UserRepository::new(pool);
        let id = repo.create("converter", true).await.unwrap();
        repo.get(id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_login_with_key() {
        let pool = create_test_pool().await;
        let user = test_user(&pool).await;
        let token = KeyManager::new(&pool, 60)
            .create_key(&user, 42, None)
            .await
            .unwrap();

        let manager = SessionManager::new(&pool, 60);
        let session = manager.login_with_key(&token, 42, None).await.unwrap();

        assert_eq!(session.user_id, user.id);
        assert_eq!(session.instance, 42);
        assert!(session.key_login);
    }

    #[tokio::test]
    async fn test_login_consumes_the_key() {
        let pool = create_test_pool().await;
        let user = test_user(&pool).await;
        let token = KeyManager::new(&pool, 60)
            .create_key(&user, 42, None)
            .await
            .unwrap();

        let manager = SessionManager::new(&pool, 60);
        manager.login_with_key(&token, 42, None).await.unwrap();

        let err = manager.login_with_key(&token, 42, None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidKey));
    }

    #[tokio::test]
    async fn test_login_rejects_inactive_user_and_still_burns_key() {
        let pool = create_test_pool().await;
        let user = test_user(&pool).await;
        let token = KeyManager::new(&pool, 60)
            .create_key(&user, 42, None)
            .await
            .unwrap();

        UserRepository::new(&pool).deactivate(user.id).await.unwrap();

        let manager = SessionManager::new(&pool, 60);
        let err = manager.login_with_key(&token, 42, None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidUser(_)));

        // Single use held even though no session was established
        let err = manager.login_with_key(&token, 42, None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidKey));
    }

    #[tokio::test]
    async fn test_login_stamps_session_expiry() {
        let pool = create_test_pool().await;
        let user = test_user(&pool).await;
        let token = KeyManager::new(&pool, 60)
            .create_key(&user, 42, None)
            .await
            .unwrap();

        let before = chrono::Utc::now().timestamp();
        let session = SessionManager::new(&pool, 60)
            .login_with_key(&token, 42, None)
            .await
            .unwrap();

        assert!(session.valid_until >= before + 60);
    }

    #[tokio::test]
    async fn test_session_from_late_login_is_reaped() {
        let pool = create_test_pool().await;
        let user = test_user(&pool).await;
        let token = KeyManager::new(&pool, 60)
            .create_key(&user, 42, None)
            .await
            .unwrap();

        // A login that consumed the key but whose session insert lands
        // only after the conversion's teardown already ran
        let key = crate::keys::KeyStore::new(&pool)
            .take(&token, 42)
            .await
            .unwrap()
            .unwrap();

        let manager = SessionManager::new(&pool, 60);
        assert_eq!(manager.terminate_for_instance(42).await.unwrap(), 0);

        let session = SessionStore::new(&pool)
            .insert(key.user_id, 42, key.valid_until)
            .await
            .unwrap();

        // The residual session does not outlive its expiry
        let purged = SessionStore::new(&pool)
            .purge_expired(key.valid_until + 1)
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert!(SessionStore::new(&pool).get(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_terminate() {
        let pool = create_test_pool().await;
        let user = test_user(&pool).await;
        let token = KeyManager::new(&pool, 60)
            .create_key(&user, 42, None)
            .await
            .unwrap();

        let manager = SessionManager::new(&pool, 60);
        let session = manager.login_with_key(&token, 42, None).await.unwrap();

        assert!(manager.terminate(&session.id).await.unwrap());
        assert!(SessionStore::new(&pool).get(&session.id).await.unwrap().is_none());
        // Idempotent
        assert!(!manager.terminate(&session.id).await.unwrap());
    }
}
