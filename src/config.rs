//! Configuration management for the PDF Pages server

use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub keys: KeyConfig,
    pub converters: ConverterConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL, used to build proxy URLs handed to
    /// the renderer (e.g. "http://localhost:3000").
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Minio,
    R2,
    S3,
    B2,
    /// In-process store, for development and tests only
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyConfig {
    /// Access key time-to-live in seconds
    pub ttl_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConverterConfig {
    pub chromium_path: Option<String>,
    pub wkhtmltopdf_path: Option<String>,
    /// Bound on how long a renderer process may run, per conversion
    pub response_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                public_url: "http://localhost:3000".to_string(),
            },
            storage: StorageConfig {
                provider: StorageProvider::Minio,
                endpoint: "http://localhost:9000".to_string(),
                bucket: "pdfpages".to_string(),
                access_key: "admin".to_string(),
                secret_key: "password123".to_string(),
                region: Some("us-east-1".to_string()),
            },
            database: DatabaseConfig {
                url: "sqlite:./pdfpages.db".to_string(),
            },
            keys: KeyConfig { ttl_seconds: 60 },
            converters: ConverterConfig {
                chromium_path: None,
                wkhtmltopdf_path: None,
                response_timeout_seconds: 30,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .unwrap_or(3000),
                public_url: env::var("PUBLIC_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            },
            storage: StorageConfig {
                provider: match env::var("S3_PROVIDER").unwrap_or_else(|_| "minio".to_string()).as_str() {
                    "r2" => StorageProvider::R2,
                    "s3" => StorageProvider::S3,
                    "b2" => StorageProvider::B2,
                    "memory" => StorageProvider::Memory,
                    _ => StorageProvider::Minio,
                },
                endpoint: env::var("S3_ENDPOINT").unwrap_or_else(|_| "http://localhost:9000".to_string()),
                bucket: env::var("S3_BUCKET").unwrap_or_else(|_| "pdfpages".to_string()),
                access_key: env::var("S3_ACCESS_KEY").unwrap_or_else(|_| "admin".to_string()),
                secret_key: env::var("S3_SECRET_KEY").unwrap_or_else(|_| "password123".to_string()),
                region: env::var("S3_REGION").ok(),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:./pdfpages.db".to_string()),
            },
            keys: KeyConfig {
                ttl_seconds: env::var("ACCESS_KEY_TTL")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .unwrap_or(60),
            },
            converters: ConverterConfig {
                chromium_path: env::var("CHROMIUM_PATH").ok(),
                wkhtmltopdf_path: env::var("WKHTMLTOPDF_PATH").ok(),
                response_timeout_seconds: env::var("CONVERTER_RESPONSE_TIMEOUT")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30),
            },
        })
    }
}
