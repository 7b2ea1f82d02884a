//! Chromium/Chrome headless converter
//!
//! Drives the chromium binary in headless print-to-PDF mode. Unknown
//! options are REJECTED with `InvalidOption`; this backend does not
//! accept a renderer cookie (the CLI surface has no way to set one), so
//! a supplied cookie is rejected rather than dropped.

use std::process::Stdio;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::process::Command;

use super::{ConvertOptions, Converter, CookiePair};
use crate::error::{AppError, Result};

/// Options accepted by the chromium backend
const VALID_OPTIONS: &[&str] = &[
    "landscape",
    "printBackground",
    "displayHeaderFooter",
    "paperWidth",
    "paperHeight",
    "marginTop",
    "marginBottom",
    "marginLeft",
    "marginRight",
    "preferCSSPageSize",
    "scale",
];

/// Converter backed by headless chromium
#[derive(Debug)]
pub struct ChromiumConverter {
    binary_path: Option<String>,
    response_timeout: Duration,
}

impl ChromiumConverter {
    pub const NAME: &'static str = "chromium";

    /// Create a converter; `binary_path` of `None` leaves it disabled
    pub fn new(binary_path: Option<String>, response_timeout: Duration) -> Self {
        Self {
            binary_path,
            response_timeout,
        }
    }

    /// Reject any option outside the allow-list
    fn validate_options(&self, options: &ConvertOptions) -> Result<()> {
        for option in options.keys() {
            if !VALID_OPTIONS.contains(&option.as_str()) {
                return Err(AppError::InvalidOption(option.clone()));
            }
        }

        Ok(())
    }

    /// Translate validated options into CLI flags
    fn option_flags(options: &ConvertOptions) -> Vec<String> {
        let mut flags = Vec::new();

        for (option, value) in options {
            let flag = camel_to_flag(option);
            match value {
                serde_json::Value::Bool(true) => flags.push(format!("--{}", flag)),
                serde_json::Value::Bool(false) => {}
                other => flags.push(format!("--{}={}", flag, json_scalar(other))),
            }
        }

        flags
    }
}

#[async_trait]
impl Converter for ChromiumConverter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn is_enabled(&self) -> bool {
        self.binary_path.is_some()
    }

    async fn render(
        &self,
        url: &str,
        options: &ConvertOptions,
        cookie: Option<&CookiePair>,
    ) -> Result<Vec<u8>> {
        // Fail fast, before any process is spawned
        self.validate_options(options)?;
        if cookie.is_some() {
            return Err(AppError::InvalidOption("cookie".to_string()));
        }

        let path = self
            .binary_path
            .as_deref()
            .ok_or_else(|| AppError::Internal("chromium binary path not configured".to_string()))?;

        let output_path =
            std::env::temp_dir().join(format!("pdfpages_{}.pdf", uuid::Uuid::new_v4()));

        let mut command = Command::new(path);
        command
            .arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg(format!("--print-to-pdf={}", output_path.display()))
            .args(Self::option_flags(options))
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            // Dropping the wait future on timeout must kill the process
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| AppError::ConversionFailed(anyhow!("failed to spawn chromium: {}", e)))?;

        let waited = tokio::time::timeout(self.response_timeout, child.wait_with_output()).await;

        let output = match waited {
            Err(_) => {
                let _ = tokio::fs::remove_file(&output_path).await;
                return Err(AppError::ConversionFailed(anyhow!(
                    "chromium timed out after {:?}",
                    self.response_timeout
                )));
            }
            Ok(Err(e)) => {
                let _ = tokio::fs::remove_file(&output_path).await;
                return Err(AppError::ConversionFailed(anyhow!(
                    "chromium process error: {}",
                    e
                )));
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let _ = tokio::fs::remove_file(&output_path).await;
            return Err(AppError::ConversionFailed(anyhow!(
                "chromium exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        // Remove the temp file whether or not the read worked
        let read = tokio::fs::read(&output_path).await;
        let _ = tokio::fs::remove_file(&output_path).await;

        read.map_err(|e| {
            AppError::ConversionFailed(anyhow!("failed to read chromium output: {}", e))
        })
    }
}

/// camelCase option name to kebab-case CLI flag.
///
/// Uppercase runs stay one word, so "preferCSSPageSize" becomes
/// "prefer-css-page-size" rather than "prefer-c-s-s-page-size".
fn camel_to_flag(option: &str) -> String {
    let chars: Vec<char> = option.chars().collect();
    let mut flag = String::with_capacity(option.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let after_lower = i > 0 && chars[i - 1].is_ascii_lowercase();
            let run_ends = i > 0
                && chars[i - 1].is_ascii_uppercase()
                && chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if after_lower || run_ends {
                flag.push('-');
            }
            flag.push(c.to_ascii_lowercase());
        } else {
            flag.push(c);
        }
    }

    flag
}

/// Render a scalar JSON value without quoting strings
fn json_scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
