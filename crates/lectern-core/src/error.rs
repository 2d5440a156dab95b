//! Error types module
//!
//! This module provides the core error type used throughout Lectern. Storage,
//! database, validation and authorization failures are unified under [`AppError`],
//! and [`ErrorMetadata`] describes how each variant is presented to clients.
//!
//! The `Database` variant wraps `sqlx::Error` when the `sqlx` feature is enabled and
//! carries a plain message otherwise.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like missing configuration
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
/// This trait allows errors to self-describe their HTTP response characteristics
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "INVALID_ID")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Storage not configured: {0}")]
    StorageUnavailable(String),

    #[error("Legacy store not configured: {0}")]
    LegacyStoreUnavailable(String),

    #[error("Invalid id: {0}")]
    InvalidId(String),

    #[error("Invalid mapping: {0}")]
    InvalidMapping(String),

    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported document type: {0}")]
    UnsupportedType(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
/// client_message stays per-variant for dynamic content.
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::StorageUnavailable(_) => (
            503,
            "STORAGE_NOT_CONFIGURED",
            false,
            Some("Configure an object storage backend"),
            false,
            LogLevel::Warn,
        ),
        AppError::LegacyStoreUnavailable(_) => (
            503,
            "LEGACY_STORE_NOT_CONFIGURED",
            false,
            Some("Set LEGACY_STORE_PATH before running migrations"),
            false,
            LogLevel::Warn,
        ),
        AppError::InvalidId(_) => (
            400,
            "INVALID_ID",
            false,
            Some("Use 1-128 characters from [a-z0-9._-]"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidMapping(_) => (
            400,
            "INVALID_MAPPING",
            false,
            Some("Check every oldId and id in the mapping list"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidNamespace(_) => (
            400,
            "INVALID_NAMESPACE",
            false,
            Some("Use 1-64 characters from [a-z0-9._-]"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the document ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::UnsupportedType(_) => (
            415,
            "UNSUPPORTED_TYPE",
            false,
            Some("Previews are only generated for paginated formats"),
            false,
            LogLevel::Debug,
        ),
        AppError::Unauthorized(_) => (
            401,
            "UNAUTHORIZED",
            false,
            Some("Sign in and retry with a valid session token"),
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::StorageUnavailable(_) => "StorageUnavailable",
            AppError::LegacyStoreUnavailable(_) => "LegacyStoreUnavailable",
            AppError::InvalidId(_) => "InvalidId",
            AppError::InvalidMapping(_) => "InvalidMapping",
            AppError::InvalidNamespace(_) => "InvalidNamespace",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotFound(_) => "NotFound",
            AppError::UnsupportedType(_) => "UnsupportedType",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::StorageUnavailable(_) => "Storage is not configured".to_string(),
            AppError::LegacyStoreUnavailable(_) => "Legacy store is not configured".to_string(),
            AppError::InvalidId(ref msg) => msg.clone(),
            AppError::InvalidMapping(ref msg) => msg.clone(),
            AppError::InvalidNamespace(ref msg) => msg.clone(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            // Same message for missing and foreign documents
            AppError::NotFound(_) => "Document not found".to_string(),
            AppError::UnsupportedType(ref msg) => msg.clone(),
            AppError::Unauthorized(ref msg) => msg.clone(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}
