//! Configuration module
//!
//! Configuration is read once at startup from the environment (optionally seeded from
//! a `.env` file) and handed to the setup code, which constructs every component
//! explicitly. Nothing below the entry point reads environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::models::DocumentType;
use crate::storage_types::StorageBackend;

// Common constants
const SERVER_PORT: u16 = 3000;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const HTTP_CONCURRENCY_LIMIT: usize = 10_000;
const PRESIGN_TTL_SECS: u64 = 300;
const PREVIEW_RETRY_AFTER_MS: u64 = 1500;
const PREVIEW_CONTENT_TYPE: &str = "image/png";
const PREVIEW_QUEUE_SIZE: usize = 1000;
const PREVIEW_MAX_CONCURRENT: usize = 2;
const PREVIEW_TIMEOUT_SECS: u64 = 120;

/// Lower bound for presigned URL lifetimes.
pub const MIN_PRESIGN_TTL_SECS: u64 = 60;
/// Upper bound for presigned URL lifetimes (S3 rejects anything above 7 days).
pub const MAX_PRESIGN_TTL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "compact" | "pretty" | "text" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid log format: {}", s)),
        }
    }
}

/// Which document metadata store backs the resolver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentStoreKind {
    Postgres,
    Memory,
}

impl FromStr for DocumentStoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(DocumentStoreKind::Postgres),
            "memory" => Ok(DocumentStoreKind::Memory),
            _ => Err(anyhow::anyhow!("Invalid document store: {}", s)),
        }
    }
}

/// Server-level settings.
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub log_format: LogFormat,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub http_concurrency_limit: usize,
}

/// Preview service configuration
#[derive(Clone, Debug)]
pub struct PreviewServiceConfig {
    pub base: BaseConfig,
    // Storage configuration
    pub storage_backend: Option<StorageBackend>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO etc.)
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub storage_key_prefix: String,
    pub presign_ttl_secs: u64,
    // Authentication
    pub auth_enabled: bool,
    pub jwt_secret: Option<String>,
    pub namespace_header_enabled: bool,
    // Document metadata store
    pub document_store: DocumentStoreKind,
    pub database_url: Option<String>,
    pub document_seed_path: Option<String>,
    // Preview generation
    pub previewable_types: Vec<DocumentType>,
    pub preview_retry_after_ms: u64,
    pub preview_content_type: String,
    pub preview_queue_size: usize,
    pub preview_max_concurrent: usize,
    pub preview_timeout_secs: u64,
    pub preview_command: Option<String>,
    // Legacy store migration
    pub legacy_store_path: Option<String>,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<PreviewServiceConfig>);

impl Config {
    fn inner(&self) -> &PreviewServiceConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = PreviewServiceConfig::from_lookup(lookup)?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_name(&self.inner().base.environment)
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn http_concurrency_limit(&self) -> usize {
        self.inner().base.http_concurrency_limit.max(1)
    }

    pub fn log_format(&self) -> LogFormat {
        self.inner().base.log_format
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().base.db_timeout_seconds
    }

    pub fn storage_backend(&self) -> Option<StorageBackend> {
        self.inner().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.inner().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn aws_region(&self) -> Option<&str> {
        self.inner().aws_region.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.inner().local_storage_base_url.as_deref()
    }

    pub fn storage_key_prefix(&self) -> &str {
        &self.inner().storage_key_prefix
    }

    /// Presigned URL lifetime, clamped to the supported range.
    pub fn presign_ttl(&self) -> Duration {
        Duration::from_secs(
            self.inner()
                .presign_ttl_secs
                .clamp(MIN_PRESIGN_TTL_SECS, MAX_PRESIGN_TTL_SECS),
        )
    }

    pub fn auth_enabled(&self) -> bool {
        self.inner().auth_enabled
    }

    pub fn jwt_secret(&self) -> Option<&str> {
        self.inner().jwt_secret.as_deref()
    }

    pub fn namespace_header_enabled(&self) -> bool {
        self.inner().namespace_header_enabled
    }

    pub fn document_store(&self) -> DocumentStoreKind {
        self.inner().document_store
    }

    pub fn database_url(&self) -> Option<&str> {
        self.inner().database_url.as_deref()
    }

    pub fn document_seed_path(&self) -> Option<&str> {
        self.inner().document_seed_path.as_deref()
    }

    pub fn previewable_types(&self) -> &[DocumentType] {
        &self.inner().previewable_types
    }

    pub fn preview_retry_after(&self) -> Duration {
        Duration::from_millis(self.inner().preview_retry_after_ms)
    }

    pub fn preview_content_type(&self) -> &str {
        &self.inner().preview_content_type
    }

    pub fn preview_queue_size(&self) -> usize {
        self.inner().preview_queue_size
    }

    pub fn preview_max_concurrent(&self) -> usize {
        self.inner().preview_max_concurrent
    }

    pub fn preview_timeout(&self) -> Duration {
        Duration::from_secs(self.inner().preview_timeout_secs)
    }

    pub fn preview_command(&self) -> Option<&str> {
        self.inner().preview_command.as_deref()
    }

    pub fn legacy_store_path(&self) -> Option<&str> {
        self.inner().legacy_store_path.as_deref()
    }
}

fn is_production_name(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

fn non_empty<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(lookup, name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {} ({})", name, raw, e)),
        None => Ok(default),
    }
}

fn parse_bool<F>(lookup: &F, name: &str) -> Result<bool, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup, name).map(|v| v.to_lowercase()) {
        None => Ok(false),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(anyhow::anyhow!("Invalid boolean for {}: {}", name, v)),
    }
}

impl PreviewServiceConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = non_empty(&lookup, "ENVIRONMENT")
            .or_else(|| non_empty(&lookup, "APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins: Vec<String> = non_empty(&lookup, "CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let base = BaseConfig {
            server_port: parse_or(&lookup, "SERVER_PORT", SERVER_PORT)?,
            cors_origins,
            environment,
            log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::Compact)?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", MAX_CONNECTIONS)?,
            db_timeout_seconds: parse_or(&lookup, "DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS)?,
            http_concurrency_limit: parse_or(
                &lookup,
                "HTTP_CONCURRENCY_LIMIT",
                HTTP_CONCURRENCY_LIMIT,
            )?,
        };

        let storage_backend = match non_empty(&lookup, "STORAGE_BACKEND") {
            Some(raw) => Some(raw.parse::<StorageBackend>()?),
            None => None,
        };

        let previewable_types = match non_empty(&lookup, "PREVIEWABLE_TYPES") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::parse::<DocumentType>)
                .collect::<Result<Vec<_>, _>>()?,
            None => DocumentType::DEFAULT_PREVIEWABLE.to_vec(),
        };

        Ok(PreviewServiceConfig {
            base,
            storage_backend,
            s3_bucket: non_empty(&lookup, "S3_BUCKET"),
            s3_region: non_empty(&lookup, "S3_REGION"),
            s3_endpoint: non_empty(&lookup, "S3_ENDPOINT"),
            aws_region: non_empty(&lookup, "AWS_REGION"),
            local_storage_path: non_empty(&lookup, "LOCAL_STORAGE_PATH"),
            local_storage_base_url: non_empty(&lookup, "LOCAL_STORAGE_BASE_URL"),
            storage_key_prefix: non_empty(&lookup, "STORAGE_KEY_PREFIX")
                .map(|p| p.trim_matches('/').to_string())
                .unwrap_or_default(),
            presign_ttl_secs: parse_or(&lookup, "PRESIGN_TTL_SECS", PRESIGN_TTL_SECS)?,
            auth_enabled: parse_bool(&lookup, "AUTH_ENABLED")?,
            jwt_secret: non_empty(&lookup, "JWT_SECRET"),
            namespace_header_enabled: parse_bool(&lookup, "NAMESPACE_HEADER_ENABLED")?,
            document_store: parse_or(&lookup, "DOCUMENT_STORE", DocumentStoreKind::Memory)?,
            database_url: non_empty(&lookup, "DATABASE_URL"),
            document_seed_path: non_empty(&lookup, "DOCUMENT_SEED_PATH"),
            previewable_types,
            preview_retry_after_ms: parse_or(
                &lookup,
                "PREVIEW_RETRY_AFTER_MS",
                PREVIEW_RETRY_AFTER_MS,
            )?,
            preview_content_type: non_empty(&lookup, "PREVIEW_CONTENT_TYPE")
                .unwrap_or_else(|| PREVIEW_CONTENT_TYPE.to_string()),
            preview_queue_size: parse_or(&lookup, "PREVIEW_QUEUE_SIZE", PREVIEW_QUEUE_SIZE)?,
            preview_max_concurrent: parse_or(
                &lookup,
                "PREVIEW_MAX_CONCURRENT",
                PREVIEW_MAX_CONCURRENT,
            )?,
            preview_timeout_secs: parse_or(&lookup, "PREVIEW_TIMEOUT_SECS", PREVIEW_TIMEOUT_SECS)?,
            preview_command: non_empty(&lookup, "PREVIEW_COMMAND"),
            legacy_store_path: non_empty(&lookup, "LEGACY_STORE_PATH"),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if is_production_name(&self.base.environment)
            && self.base.cors_origins.iter().any(|o| o == "*")
        {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.auth_enabled && self.jwt_secret.is_none() {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be set when AUTH_ENABLED is true"
            ));
        }

        match self.storage_backend {
            Some(StorageBackend::S3) => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when STORAGE_BACKEND=s3"
                    ));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when STORAGE_BACKEND=s3"
                    ));
                }
            }
            Some(StorageBackend::Local) => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when STORAGE_BACKEND=local"
                    ));
                }
            }
            None => {}
        }

        if self.document_store == DocumentStoreKind::Postgres && self.database_url.is_none() {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be set when DOCUMENT_STORE=postgres"
            ));
        }

        if self.preview_queue_size == 0 || self.preview_max_concurrent == 0 {
            return Err(anyhow::anyhow!(
                "PREVIEW_QUEUE_SIZE and PREVIEW_MAX_CONCURRENT must be at least 1"
            ));
        }

        if self.previewable_types.is_empty() {
            return Err(anyhow::anyhow!("PREVIEWABLE_TYPES must not be empty"));
        }

        Ok(())
    }
}
