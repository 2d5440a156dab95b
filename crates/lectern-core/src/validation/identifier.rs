//! Identifier validation.
//!
//! Document ids and namespaces end up inside blob keys and legacy filesystem paths,
//! so both are restricted to `[a-z0-9._-]` before anything touches storage. A leading
//! dot is rejected too, which rules out `.` and `..` as path components.

use crate::error::AppError;
use regex::Regex;
use std::sync::LazyLock;

/// Maximum length of a document id.
pub const MAX_ID_LENGTH: usize = 128;

/// Maximum length of a namespace tag.
pub const MAX_NAMESPACE_LENGTH: usize = 64;

/// Blob key segment used when a request carries no namespace; never a valid namespace.
pub const NO_NAMESPACE_SEGMENT: &str = "_";

static SAFE_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_-][a-z0-9._-]*$").expect("identifier regex is valid"));

fn is_safe(value: &str, max_len: usize) -> bool {
    !value.is_empty()
        && value.len() <= max_len
        && !value.contains("..")
        && SAFE_IDENTIFIER.is_match(value)
}

/// Trim and lower-case a raw document id, rejecting anything outside the safe set.
pub fn normalize_document_id(raw: &str) -> Result<String, AppError> {
    let id = raw.trim().to_lowercase();
    if is_safe(&id, MAX_ID_LENGTH) {
        Ok(id)
    } else {
        Err(AppError::InvalidId(format!(
            "Document id must be 1-{} characters from [a-z0-9._-] and must not start with '.'",
            MAX_ID_LENGTH
        )))
    }
}

/// Trim and lower-case a raw namespace tag, rejecting anything outside the safe set.
pub fn normalize_namespace(raw: &str) -> Result<String, AppError> {
    let namespace = raw.trim().to_lowercase();
    if namespace != NO_NAMESPACE_SEGMENT && is_safe(&namespace, MAX_NAMESPACE_LENGTH) {
        Ok(namespace)
    } else {
        Err(AppError::InvalidNamespace(format!(
            "Namespace must be 1-{} characters from [a-z0-9._-]",
            MAX_NAMESPACE_LENGTH
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_case_and_whitespace() {
        assert_eq!(normalize_document_id("  Doc1 ").unwrap(), "doc1");
        assert_eq!(normalize_document_id("a.b_c-d").unwrap(), "a.b_c-d");
    }

    #[test]
    fn test_rejects_traversal_and_separators() {
        for raw in ["../etc", "a/b", "a\\b", "..", ".", ".hidden", "a..b", "doc 1", "", "   "] {
            let err = normalize_document_id(raw).unwrap_err();
            assert!(matches!(err, AppError::InvalidId(_)), "accepted {:?}", raw);
        }
    }

    #[test]
    fn test_length_bound() {
        let max = "a".repeat(MAX_ID_LENGTH);
        assert!(normalize_document_id(&max).is_ok());
        let too_long = "a".repeat(MAX_ID_LENGTH + 1);
        assert!(normalize_document_id(&too_long).is_err());
    }

    #[test]
    fn test_namespace_rules() {
        assert_eq!(normalize_namespace("Test-Run_7").unwrap(), "test-run_7");
        assert!(matches!(
            normalize_namespace("a/b"),
            Err(AppError::InvalidNamespace(_))
        ));
        assert!(normalize_namespace(&"n".repeat(MAX_NAMESPACE_LENGTH + 1)).is_err());
        assert!(normalize_namespace("_").is_err());
    }
}
