//! Document repository: metadata lookups for the documents table.

use async_trait::async_trait;
use lectern_core::models::{DocumentRecord, DocumentType};
use lectern_core::AppError;
use sqlx::{PgPool, Postgres};

/// Trait for document metadata operations
///
/// The resolver only needs "rows with this id in this namespace owned by one of
/// these users"; ownership decisions stay in the service layer.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Every row with `id` in `namespace` whose owner is in `owners`.
    async fn find_for_owners(
        &self,
        id: &str,
        namespace: Option<&str>,
        owners: &[String],
    ) -> Result<Vec<DocumentRecord>, AppError>;
}

/// Row type for documents table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct DocumentRow {
    pub id: String,
    pub user_id: String,
    pub namespace: Option<String>,
    pub document_type: String,
    pub last_modified: i64,
    pub source_key: String,
}

impl DocumentRow {
    pub fn to_document_record(self) -> Result<DocumentRecord, AppError> {
        let document_type = self.document_type.parse::<DocumentType>().map_err(|e| {
            AppError::Internal(format!(
                "Document {} has an unknown type: {}",
                self.id, e
            ))
        })?;
        Ok(DocumentRecord {
            id: self.id,
            user_id: self.user_id,
            namespace: self.namespace,
            document_type,
            last_modified: self.last_modified,
            source_key: self.source_key,
        })
    }
}

/// Repository for the documents table.
#[derive(Clone)]
pub struct PostgresDocumentRepository {
    pool: PgPool,
}

impl PostgresDocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentRepository for PostgresDocumentRepository {
    #[tracing::instrument(skip(self, owners), fields(db.table = "documents", db.record_id = %id, owners = owners.len()))]
    async fn find_for_owners(
        &self,
        id: &str,
        namespace: Option<&str>,
        owners: &[String],
    ) -> Result<Vec<DocumentRecord>, AppError> {
        if owners.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<DocumentRow> = sqlx::query_as::<Postgres, DocumentRow>(
            r#"
            SELECT id, user_id, namespace, document_type, last_modified, source_key
            FROM documents
            WHERE id = $1
              AND namespace IS NOT DISTINCT FROM $2
              AND user_id = ANY($3)
            "#,
        )
        .bind(id)
        .bind(namespace)
        .bind(owners)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(DocumentRow::to_document_record)
            .collect()
    }
}
