//! Page-to-PDF conversion
//!
//! Defines the converter collaborator trait, the concrete renderer
//! backends and the orchestration service that ties key issue, proxy
//! login, rendering and artifact storage into one unit with guaranteed
//! cleanup.

mod chromium;
mod factory;
mod service;
mod wkhtmltopdf;

pub use chromium::ChromiumConverter;
pub use factory::*;
pub use service::*;
pub use wkhtmltopdf::WkhtmltopdfConverter;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;

/// Renderer options, validated per backend against its allow-list
pub type ConvertOptions = serde_json::Map<String, serde_json::Value>;

/// Optional cookie forwarded to the renderer, for renderer-side session
/// continuity separate from the access-key exchange
#[derive(Debug, Clone, Deserialize)]
pub struct CookiePair {
    pub name: String,
    pub value: String,
}

/// External renderer collaborator
#[async_trait]
pub trait Converter: Send + Sync + std::fmt::Debug {
    /// Backend name, also the artifact namespace
    fn name(&self) -> &'static str;

    /// Whether the backing binary is configured
    fn is_enabled(&self) -> bool;

    /// Fetch `url` and render it to PDF bytes.
    ///
    /// Options outside the backend's allow-list are handled per its
    /// documented policy before any process is spawned. Process-level
    /// failures come back as `ConversionFailed`; the renderer process is
    /// always released, including on timeout.
    async fn render(
        &self,
        url: &str,
        options: &ConvertOptions,
        cookie: Option<&CookiePair>,
    ) -> Result<Vec<u8>>;
}
