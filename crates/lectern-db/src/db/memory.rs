//! Embedded document store for single-node deployments and tests.

use crate::db::document::DocumentRepository;
use async_trait::async_trait;
use lectern_core::models::DocumentRecord;
use lectern_core::validation::{normalize_document_id, normalize_namespace};
use lectern_core::AppError;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

type IdentityKey = (String, String, Option<String>);

fn identity_key(record: &DocumentRecord) -> IdentityKey {
    (
        record.id.clone(),
        record.user_id.clone(),
        record.namespace.clone(),
    )
}

/// In-memory document repository, optionally seeded from a JSON array of records.
#[derive(Default)]
pub struct MemoryDocumentRepository {
    documents: RwLock<HashMap<IdentityKey, DocumentRecord>>,
}

impl MemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = DocumentRecord>) -> Self {
        let documents = records
            .into_iter()
            .map(|record| (identity_key(&record), record))
            .collect();
        Self {
            documents: RwLock::new(documents),
        }
    }

    /// Load records from a JSON seed file.
    ///
    /// Ids and namespaces are normalized the way request identifiers are, so a seeded
    /// `Doc1` is found by a lookup for `doc1`. A row that fails validation rejects the
    /// whole file.
    pub async fn from_seed_file(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path).await?;
        let records = serde_json::from_slice::<Vec<DocumentRecord>>(&raw)?
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                normalize_seed_record(record).map_err(|e| {
                    AppError::InvalidInput(format!(
                        "Seed record {} in {}: {}",
                        index,
                        path.display(),
                        e
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!(
            path = %path.display(),
            count = records.len(),
            "Seeded in-memory document store"
        );
        Ok(Self::with_records(records))
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }
}

fn normalize_seed_record(mut record: DocumentRecord) -> Result<DocumentRecord, AppError> {
    record.id = normalize_document_id(&record.id)?;
    record.namespace = record
        .namespace
        .as_deref()
        .map(normalize_namespace)
        .transpose()?;
    Ok(record)
}

#[async_trait]
impl DocumentRepository for MemoryDocumentRepository {
    async fn find_for_owners(
        &self,
        id: &str,
        namespace: Option<&str>,
        owners: &[String],
    ) -> Result<Vec<DocumentRecord>, AppError> {
        let documents = self.documents.read().await;
        Ok(documents
            .values()
            .filter(|record| {
                record.id == id
                    && record.namespace.as_deref() == namespace
                    && owners.iter().any(|owner| *owner == record.user_id)
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::models::DocumentType;

    fn record(id: &str, user_id: &str, namespace: Option<&str>) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            user_id: user_id.to_string(),
            namespace: namespace.map(String::from),
            document_type: DocumentType::Pdf,
            last_modified: 1000,
            source_key: format!("uploads/{}.pdf", id),
        }
    }

    #[tokio::test]
    async fn test_find_filters_owner_and_namespace() {
        let repo = MemoryDocumentRepository::with_records([
            record("doc1", "alice", None),
            record("doc1", "unclaimed::ns", Some("ns")),
            record("doc1", "bob", None),
        ]);

        let rows = repo
            .find_for_owners("doc1", None, &["alice".to_string(), "unclaimed".to_string()])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, "alice");

        let rows = repo
            .find_for_owners("doc1", Some("ns"), &["unclaimed::ns".to_string()])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);

        let rows = repo.find_for_owners("doc1", None, &[]).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_seed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        tokio::fs::write(
            &path,
            r#"[{"id":"doc1","user_id":"unclaimed","document_type":"pdf","last_modified":1000,"source_key":"uploads/doc1.pdf"}]"#,
        )
        .await
        .unwrap();

        let repo = MemoryDocumentRepository::from_seed_file(&path).await.unwrap();
        assert_eq!(repo.len().await, 1);

        let bad = dir.path().join("bad.json");
        tokio::fs::write(&bad, "{not json").await.unwrap();
        assert!(MemoryDocumentRepository::from_seed_file(&bad).await.is_err());
    }

    #[tokio::test]
    async fn test_seed_ids_are_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        tokio::fs::write(
            &path,
            r#"[{"id":" Doc1 ","user_id":"unclaimed::run-a","namespace":"Run-A","document_type":"pdf","last_modified":1000,"source_key":"uploads/doc1.pdf"}]"#,
        )
        .await
        .unwrap();

        let repo = MemoryDocumentRepository::from_seed_file(&path).await.unwrap();
        let rows = repo
            .find_for_owners("doc1", Some("run-a"), &["unclaimed::run-a".to_string()])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "doc1");

        let unsafe_id = dir.path().join("unsafe.json");
        tokio::fs::write(
            &unsafe_id,
            r#"[{"id":"../etc","user_id":"unclaimed","document_type":"pdf","last_modified":1000,"source_key":"uploads/x.pdf"}]"#,
        )
        .await
        .unwrap();
        assert!(matches!(
            MemoryDocumentRepository::from_seed_file(&unsafe_id).await,
            Err(AppError::InvalidInput(_))
        ));
    }
}
