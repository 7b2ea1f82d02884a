//! Conversion orchestration
//!
//! Runs "issue key, build proxy URL, render, persist, tear down" as one
//! unit. Whatever the renderer does, the sessions its proxy login created
//! and any unconsumed key are destroyed before the result is surfaced.

use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use super::{converter_for, ConvertOptions, Converter, CookiePair};
use crate::config::Config;
use crate::error::Result;
use crate::keys::{derive_instance, KeyManager};
use crate::session::SessionManager;
use crate::storage::BlobStore;
use crate::users::User;

/// Storage area for converted artifacts
pub const PDF_AREA: &str = "pdf";

/// A stored conversion result
#[derive(Debug, Clone)]
pub struct Artifact {
    pub area: String,
    /// Converter name; artifacts are namespaced per backend
    pub namespace: String,
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Canonical artifact filename for a resource identity.
///
/// Content-derived, so converting the same page again lands on the same
/// storage slot.
pub fn artifact_filename(resource_identity: &str) -> String {
    let digest = Sha256::digest(resource_identity.as_bytes());
    format!("{}.pdf", hex::encode(digest))
}

/// Build the proxy URL the renderer is pointed at
pub fn build_proxy_url(public_url: &str, target_url: &str, token: &str, instance: i64) -> String {
    format!(
        "{}/proxy?url={}&key={}&instance={}",
        public_url.trim_end_matches('/'),
        urlencoding::encode(target_url),
        token,
        instance
    )
}

/// Orchestrator for page-to-PDF conversions
pub struct ConversionService<'a> {
    config: &'a Config,
    pool: &'a SqlitePool,
    store: &'a dyn BlobStore,
}

impl<'a> ConversionService<'a> {
    /// Create a new service
    pub fn new(config: &'a Config, pool: &'a SqlitePool, store: &'a dyn BlobStore) -> Self {
        Self {
            config,
            pool,
            store,
        }
    }

    /// Convert a page to PDF as `subject`, using the named converter or
    /// the first enabled one.
    pub async fn convert(
        &self,
        subject: &User,
        target_url: &str,
        converter_name: Option<&str>,
        options: &ConvertOptions,
        cookie: Option<&CookiePair>,
        ip_restriction: Option<&str>,
    ) -> Result<Artifact> {
        let converter = converter_for(&self.config.converters, converter_name)?;
        self.convert_with(
            subject,
            converter.as_ref(),
            target_url,
            options,
            cookie,
            ip_restriction,
        )
        .await
    }

    /// Convert with an explicit converter instance.
    ///
    /// A failed conversion leaves nothing behind: no live key, no session,
    /// no partial artifact. It is not retried; the caller starts over with
    /// a fresh call.
    pub async fn convert_with(
        &self,
        subject: &User,
        converter: &dyn Converter,
        target_url: &str,
        options: &ConvertOptions,
        cookie: Option<&CookiePair>,
        ip_restriction: Option<&str>,
    ) -> Result<Artifact> {
        let filename = artifact_filename(target_url);
        let instance = derive_instance(target_url);

        let keys = KeyManager::new(self.pool, self.config.keys.ttl_seconds);
        let token = keys.create_key(subject, instance, ip_restriction).await?;
        let proxy_url = build_proxy_url(&self.config.server.public_url, target_url, &token, instance);

        tracing::info!(
            user_id = subject.id,
            instance,
            converter = converter.name(),
            "Starting conversion"
        );

        let rendered = converter.render(&proxy_url, options, cookie).await;

        // Cleanup on every exit path: the proxy-login session must not
        // outlive the render, and an unconsumed key must not linger.
        let sessions = SessionManager::new(self.pool, self.config.keys.ttl_seconds);
        if let Err(e) = sessions.terminate_for_instance(instance).await {
            tracing::error!(instance, "Failed to terminate sessions: {}", e);
        }
        if let Err(e) = keys.delete_key(subject.id, instance).await {
            tracing::error!(instance, "Failed to revoke access key: {}", e);
        }

        let bytes = rendered?;

        // Replace any prior artifact at the slot outright
        self.store
            .delete(PDF_AREA, converter.name(), &filename)
            .await?;
        self.store
            .put(PDF_AREA, converter.name(), &filename, bytes.clone())
            .await?;

        tracing::info!(
            instance,
            converter = converter.name(),
            size = bytes.len(),
            "Stored converted artifact"
        );

        Ok(Artifact {
            area: PDF_AREA.to_string(),
            namespace: converter.name().to_string(),
            filename,
            bytes,
        })
    }

    /// Look up a previously converted artifact; pure, no session traffic
    pub async fn get_artifact(
        &self,
        target_url: &str,
        converter_name: &str,
    ) -> Result<Option<Artifact>> {
        let filename = artifact_filename(target_url);

        let bytes = self.store.get(PDF_AREA, converter_name, &filename).await?;

        Ok(bytes.map(|bytes| Artifact {
            area: PDF_AREA.to_string(),
            namespace: converter_name.to_string(),
            filename,
            bytes,
        }))
    }
}
