//! Shared key generation for storage backends.
//!
//! Key format: `{prefix/}previews/{namespace|_}/{id}/{version}`.

use crate::traits::{StorageError, StorageResult};
use lectern_core::validation::NO_NAMESPACE_SEGMENT;

const PREVIEW_ROOT: &str = "previews";

/// Reject keys that could escape the store root or alias another key.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.starts_with('/') || key.contains('\\') || key.split('/').any(|segment| segment == "..")
    {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

/// Builds every blob key the service writes, under an optional global prefix.
#[derive(Debug, Clone, Default)]
pub struct KeyLayout {
    prefix: String,
}

impl KeyLayout {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into().trim_matches('/').to_string();
        Self { prefix }
    }

    fn join(&self, rest: String) -> String {
        if self.prefix.is_empty() {
            rest
        } else {
            format!("{}/{}", self.prefix, rest)
        }
    }

    /// Artifact key for one document version. Never reused across versions.
    pub fn preview_key(&self, namespace: Option<&str>, id: &str, version: i64) -> String {
        self.join(format!(
            "{}/{}/{}/{}",
            PREVIEW_ROOT,
            namespace.unwrap_or(NO_NAMESPACE_SEGMENT),
            id,
            version
        ))
    }

    /// Prefix covering every version of one document's previews.
    pub fn document_prefix(&self, namespace: Option<&str>, id: &str) -> String {
        self.join(format!(
            "{}/{}/{}/",
            PREVIEW_ROOT,
            namespace.unwrap_or(NO_NAMESPACE_SEGMENT),
            id
        ))
    }

    /// Prefix covering every preview in a namespace.
    pub fn namespace_prefix(&self, namespace: &str) -> String {
        self.join(format!("{}/{}/", PREVIEW_ROOT, namespace))
    }

    /// Source document keys come from metadata; they only get the global prefix.
    pub fn source_key(&self, key: &str) -> String {
        self.join(key.trim_start_matches('/').to_string())
    }
}
