use crate::context::Namespace;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Pdf,
    Epub,
    Docx,
    Html,
    Txt,
    Md,
}

impl DocumentType {
    /// Paginated formats that have a preview converter by default.
    pub const DEFAULT_PREVIEWABLE: [DocumentType; 3] =
        [DocumentType::Pdf, DocumentType::Epub, DocumentType::Docx];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Pdf => "pdf",
            DocumentType::Epub => "epub",
            DocumentType::Docx => "docx",
            DocumentType::Html => "html",
            DocumentType::Txt => "txt",
            DocumentType::Md => "md",
        }
    }
}

impl FromStr for DocumentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pdf" => Ok(DocumentType::Pdf),
            "epub" => Ok(DocumentType::Epub),
            "docx" => Ok(DocumentType::Docx),
            "html" | "htm" => Ok(DocumentType::Html),
            "txt" => Ok(DocumentType::Txt),
            "md" | "markdown" => Ok(DocumentType::Md),
            _ => Err(anyhow::anyhow!("Invalid document type: {}", s)),
        }
    }
}

impl Display for DocumentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Document metadata row as returned by the repository.
///
/// `user_id` always holds an owner; unclaimed documents carry the namespace
/// placeholder id (see [`crate::context::unclaimed_user_id`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub namespace: Option<String>,
    pub document_type: DocumentType,
    /// Last-modified timestamp in milliseconds; doubles as the preview version.
    pub last_modified: i64,
    /// Blob key of the uploaded source file.
    pub source_key: String,
}

/// A document the caller is allowed to preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentIdentity {
    pub id: String,
    /// `None` when the document is unclaimed.
    pub owner_user_id: Option<String>,
    pub namespace: Option<Namespace>,
    pub document_type: DocumentType,
    pub version: i64,
    pub source_key: String,
}

impl DocumentIdentity {
    pub fn namespace_str(&self) -> Option<&str> {
        self.namespace.as_ref().map(Namespace::as_str)
    }
}
