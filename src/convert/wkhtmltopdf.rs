//! wkhtmltopdf converter
//!
//! Shells out to the wkhtmltopdf binary, reading the PDF from stdout.
//! Unknown options are SILENTLY FILTERED against the allow-list rather
//! than rejected; the optional renderer cookie is forwarded via
//! `--cookie`.

use std::process::Stdio;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::process::Command;

use super::{ConvertOptions, Converter, CookiePair};
use crate::error::{AppError, Result};

/// Options accepted by the wkhtmltopdf backend.
/// For the full vocabulary see https://wkhtmltopdf.org/usage/wkhtmltopdf.txt
const VALID_OPTIONS: &[&str] = &[
    "collate",
    "no-collate",
    "copies",
    "dpi",
    "grayscale",
    "image-dpi",
    "image-quality",
    "lowquality",
    "margin-bottom",
    "margin-left",
    "margin-right",
    "margin-top",
    "orientation",
    "page-height",
    "page-size",
    "page-width",
    "no-pdf-compression",
    "quiet",
    "title",
    "outline",
    "no-outline",
    "outline-depth",
    "background",
    "no-background",
    "encoding",
    "disable-external-links",
    "enable-external-links",
    "disable-forms",
    "enable-forms",
    "images",
    "no-images",
    "disable-internal-links",
    "enable-internal-links",
    "disable-javascript",
    "enable-javascript",
    "javascript-delay",
    "load-error-handling",
    "load-media-error-handling",
    "minimum-font-size",
    "print-media-type",
    "no-print-media-type",
    "disable-smart-shrinking",
    "enable-smart-shrinking",
    "stop-slow-scripts",
    "no-stop-slow-scripts",
    "user-style-sheet",
    "viewport-size",
    "window-status",
    "zoom",
    "footer-center",
    "footer-font-size",
    "footer-html",
    "footer-left",
    "footer-line",
    "footer-right",
    "footer-spacing",
    "header-center",
    "header-font-size",
    "header-html",
    "header-left",
    "header-line",
    "header-right",
    "header-spacing",
];

/// Converter backed by wkhtmltopdf
#[derive(Debug)]
pub struct WkhtmltopdfConverter {
    binary_path: Option<String>,
    response_timeout: Duration,
}

impl WkhtmltopdfConverter {
    pub const NAME: &'static str = "wkhtmltopdf";

    /// Create a converter; `binary_path` of `None` leaves it disabled
    pub fn new(binary_path: Option<String>, response_timeout: Duration) -> Self {
        Self {
            binary_path,
            response_timeout,
        }
    }

    /// Drop unknown options, keeping the rest as CLI arguments
    fn filter_option_args(options: &ConvertOptions) -> Vec<String> {
        let mut args = Vec::new();

        for (option, value) in options {
            if !VALID_OPTIONS.contains(&option.as_str()) {
                tracing::debug!(%option, "Dropping option unknown to wkhtmltopdf");
                continue;
            }

            match value {
                serde_json::Value::Bool(true) => args.push(format!("--{}", option)),
                serde_json::Value::Bool(false) => {}
                serde_json::Value::String(s) => {
                    args.push(format!("--{}", option));
                    args.push(s.clone());
                }
                other => {
                    args.push(format!("--{}", option));
                    args.push(other.to_string());
                }
            }
        }

        args
    }
}

#[async_trait]
impl Converter for WkhtmltopdfConverter {
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
        let path = self.binary_path.as_deref().ok_or_else(|| {
            AppError::Internal("wkhtmltopdf binary path not configured".to_string())
        })?;

        let mut command = Command::new(path);
        command.args(Self::filter_option_args(options));

        if let Some(cookie) = cookie {
            command.arg("--cookie").arg(&cookie.name).arg(&cookie.value);
        }

        command
            .arg(url)
            .arg("-") // PDF on stdout
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| {
            AppError::ConversionFailed(anyhow!("failed to spawn wkhtmltopdf: {}", e))
        })?;

        let waited = tokio::time::timeout(self.response_timeout, child.wait_with_output()).await;

        let output = match waited {
            Err(_) => {
                return Err(AppError::ConversionFailed(anyhow!(
                    "wkhtmltopdf timed out after {:?}",
                    self.response_timeout
                )))
            }
            Ok(Err(e)) => {
                return Err(AppError::ConversionFailed(anyhow!(
                    "wkhtmltopdf process error: {}",
                    e
                )))
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::ConversionFailed(anyhow!(
                "wkhtmltopdf exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    fn options(pairs: &[(&str, serde_json::Value)]) -> ConvertOptions {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn fake_wkhtmltopdf(dir: &tempfile::TempDir, body: &str) -> String {
        let path = dir.path().join("wkhtmltopdf.sh");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh").unwrap();
        writeln!(file, "{}", body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_unknown_options_are_filtered_silently() {
        let opts = options(&[
            ("orientation", serde_json::json!("Landscape")),
            ("definitely-not-real", serde_json::json!(true)),
            ("zoom", serde_json::json!(1.5)),
        ]);

        let args = WkhtmltopdfConverter::filter_option_args(&opts);
        assert!(args.contains(&"--orientation".to_string()));
        assert!(args.contains(&"Landscape".to_string()));
        assert!(args.contains(&"--zoom".to_string()));
        assert!(!args.iter().any(|a| a.contains("definitely-not-real")));
    }

    #[test]
    fn test_false_flags_are_omitted() {
        let opts = options(&[("grayscale", serde_json::Value::Bool(false))]);
        assert!(WkhtmltopdfConverter::filter_option_args(&opts).is_empty());
    }

    #[tokio::test]
    async fn test_render_reads_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let script = fake_wkhtmltopdf(&dir, "printf '%%PDF-from-stdout'");

        let converter = WkhtmltopdfConverter::new(Some(script), Duration::from_secs(5));
        let bytes = converter
            .render("http://localhost/page", &ConvertOptions::new(), None)
            .await
            .unwrap();

        assert_eq!(bytes, b"%PDF-from-stdout");
    }

    #[tokio::test]
    async fn test_render_forwards_cookie() {
        let dir = tempfile::tempdir().unwrap();
        // Echo the arguments back so the test can see them
        let script = fake_wkhtmltopdf(&dir, r#"printf '%s ' "$@""#);

        let converter = WkhtmltopdfConverter::new(Some(script), Duration::from_secs(5));
        let cookie = CookiePair {
            name: "sid".to_string(),
            value: "s3cret".to_string(),
        };

        let bytes = converter
            .render("http://localhost/page", &ConvertOptions::new(), Some(&cookie))
            .await
            .unwrap();
        let echoed = String::from_utf8(bytes).unwrap();

        assert!(echoed.contains("--cookie sid s3cret"));
        assert!(echoed.contains("http://localhost/page -"));
    }

    #[tokio::test]
    async fn test_render_failure_is_conversion_failed() {
        let dir = tempfile::tempdir().unwrap();
        let script = fake_wkhtmltopdf(&dir, "echo 'network error' >&2; exit 1");

        let converter = WkhtmltopdfConverter::new(Some(script), Duration::from_secs(5));
        let err = converter
            .render("http://localhost/page", &ConvertOptions::new(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ConversionFailed(_)));
    }
}
