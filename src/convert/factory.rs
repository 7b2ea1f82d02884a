//! Converter selection
//!
//! Instantiates converters per request, filtered to those whose backing
//! binary is configured.

use std::sync::Arc;
use std::time::Duration;

use super::{ChromiumConverter, Converter, WkhtmltopdfConverter};
use crate::config::ConverterConfig;
use crate::error::{AppError, Result};

/// All converters whose backing binary is configured
pub fn available_converters(config: &ConverterConfig) -> Vec<Arc<dyn Converter>> {
    let timeout = Duration::from_secs(config.response_timeout_seconds);

    let all: Vec<Arc<dyn Converter>> = vec![
        Arc::new(ChromiumConverter::new(config.chromium_path.clone(), timeout)),
        Arc::new(WkhtmltopdfConverter::new(
            config.wkhtmltopdf_path.clone(),
            timeout,
        )),
    ];

    all.into_iter().filter(|c| c.is_enabled()).collect()
}

/// Pick a converter by name, or the first enabled one when no name is given
pub fn converter_for(config: &ConverterConfig, name: Option<&str>) -> Result<Arc<dyn Converter>> {
    let mut available = available_converters(config);

    match name {
        Some(name) => available
            .into_iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| AppError::NotFound(format!("No enabled converter named '{}'", name))),
        None => {
            if available.is_empty() {
                Err(AppError::NotFound("No converters are enabled".to_string()))
            } else {
                Ok(available.remove(0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chromium: Option<&str>, wkhtmltopdf: Option<&str>) -> ConverterConfig {
        ConverterConfig {
            chromium_path: chromium.map(|s| s.to_string()),
            wkhtmltopdf_path: wkhtmltopdf.map(|s| s.to_string()),
            response_timeout_seconds: 5,
        }
    }

    #[test]
    fn test_filters_to_configured_binaries() {
        let available = available_converters(&config(Some("/usr/bin/chromium"), None));
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].name(), "chromium");
    }

    #[test]
    fn test_named_lookup() {
        let cfg = config(Some("/usr/bin/chromium"), Some("/usr/bin/wkhtmltopdf"));

        let converter = converter_for(&cfg, Some("wkhtmltopdf")).unwrap();
        assert_eq!(converter.name(), "wkhtmltopdf");

        let err = converter_for(&cfg, Some("princexml")).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_disabled_converter_is_not_selectable() {
        let cfg = config(Some("/usr/bin/chromium"), None);
        let err = converter_for(&cfg, Some("wkhtmltopdf")).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_default_is_first_enabled() {
        let cfg = config(None, Some("/usr/bin/wkhtmltopdf"));
        let converter = converter_for(&cfg, None).unwrap();
        assert_eq!(converter.name(), "wkhtmltopdf");

        let err = converter_for(&config(None, None), None).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
