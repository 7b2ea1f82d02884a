//! Access key issue, validation and instance derivation

use std::net::IpAddr;

use ipnet::IpNet;
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use super::{AccessKey, KeyStore, KEY_SCOPE};
use crate::error::{AppError, Result};
use crate::users::User;

/// Instance ids must fit an 18-digit integer column
const INSTANCE_MODULUS: u64 = 1_000_000_000_000_000_000;

/// Derive the deterministic instance id for a resource identity string.
///
/// Same identity always yields the same id, across processes. Distinct
/// identities colliding after truncation is an accepted risk; it is not
/// detected or corrected.
pub fn derive_instance(seed: &str) -> i64 {
    let digest = Sha256::digest(seed.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);

    (u64::from_be_bytes(prefix) % INSTANCE_MODULUS) as i64
}

/// Manager for the access key lifecycle
pub struct KeyManager<'a> {
    store: KeyStore<'a>,
    ttl_seconds: i64,
}

impl<'a> KeyManager<'a> {
    /// Create a new manager
    pub fn new(pool: &'a SqlitePool, ttl_seconds: i64) -> Self {
        Self {
            store: KeyStore::new(pool),
            ttl_seconds,
        }
    }

    /// Issue a single-use key binding `subject` to `instance`.
    ///
    /// Any prior key for the same (user, instance) tuple is revoked first,
    /// so re-issuing is idempotent. Fails with PermissionDenied before
    /// anything is written if the subject lacks the generate capability.
    pub async fn create_key(
        &self,
        subject: &User,
        instance: i64,
        ip_restriction: Option<&str>,
    ) -> Result<String> {
        if !subject.can_generate_pdf {
            return Err(AppError::PermissionDenied(
                "user may not generate PDFs".to_string(),
            ));
        }

        self.store.delete_for(subject.id, instance).await?;

        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let value = hex::encode(bytes);

        let key = AccessKey {
            value: value.clone(),
            script: KEY_SCOPE.to_string(),
            user_id: subject.id,
            instance,
            ip_restriction: ip_restriction.map(|s| s.to_string()),
            valid_until: chrono::Utc::now().timestamp() + self.ttl_seconds,
        };
        self.store.insert(&key).await?;

        tracing::debug!(
            user_id = subject.id,
            instance,
            ttl = self.ttl_seconds,
            "Issued access key"
        );

        Ok(value)
    }

    /// Exchange a token: atomically consume it, then check expiry and any
    /// IP restriction.
    ///
    /// The consuming delete runs first, so a token survives at most one
    /// exchange attempt even when the attempt goes on to fail its expiry
    /// or origin checks.
    pub async fn consume_key(
        &self,
        token: &str,
        instance: i64,
        origin: Option<IpAddr>,
    ) -> Result<AccessKey> {
        let key = self
            .store
            .take(token, instance)
            .await?
            .ok_or(AppError::InvalidKey)?;

        if key.valid_until < chrono::Utc::now().timestamp() {
            return Err(AppError::InvalidKey);
        }

        if let Some(restriction) = &key.ip_restriction {
            let allowed = origin.is_some_and(|ip| ip_within_restriction(ip, restriction));
            if !allowed {
                return Err(AppError::IpRestrictionMismatch);
            }
        }

        Ok(key)
    }

    /// Revoke the key for a (user, instance) tuple; idempotent
    pub async fn delete_key(&self, user_id: i64, instance: i64) -> Result<bool> {
        self.store.delete_for(user_id, instance).await
    }
}

/// Check a client address against a stored restriction, either a CIDR
/// range or a single address. Unparseable restrictions fail closed.
fn ip_within_restriction(origin: IpAddr, restriction: &str) -> bool {
    if let Ok(net) = restriction.parse::<IpNet>() {
        return net.contains(&origin);
    }
    if let Ok(ip) = restriction.parse::<IpAddr>() {
        return ip == origin;
    }

    tracing::warn!(restriction, "Unparseable IP restriction on access key");
    false
}
