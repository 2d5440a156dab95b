use lectern_core::models::{DocumentIdentity, DocumentRecord, DocumentType};
use lectern_core::validation::normalize_document_id;
use lectern_core::{AppError, RequestContext};
use lectern_db::DocumentRepository;
use std::sync::Arc;

/// Resolves which stored document a caller may access.
///
/// With authentication disabled only the namespace placeholder owner is consulted and
/// any session user is ignored. With authentication enabled the caller must have a
/// session and may see rows owned by themselves or by the placeholder; their own row
/// wins when both exist. Rows owned by anybody else are reported as not found.
#[derive(Clone)]
pub struct DocumentResolver {
    repository: Arc<dyn DocumentRepository>,
    auth_enabled: bool,
    previewable: Vec<DocumentType>,
}

impl DocumentResolver {
    pub fn new(
        repository: Arc<dyn DocumentRepository>,
        auth_enabled: bool,
        previewable: Vec<DocumentType>,
    ) -> Self {
        Self {
            repository,
            auth_enabled,
            previewable,
        }
    }

    /// Resolve a previewable document.
    #[tracing::instrument(skip(self, ctx), fields(namespace = ?ctx.namespace_str()))]
    pub async fn resolve(
        &self,
        raw_id: &str,
        ctx: &RequestContext,
    ) -> Result<DocumentIdentity, AppError> {
        let identity = self.resolve_owned(raw_id, ctx).await?;
        if !self.previewable.contains(&identity.document_type) {
            return Err(AppError::UnsupportedType(format!(
                "Previews are not available for {} documents",
                identity.document_type
            )));
        }
        Ok(identity)
    }

    /// Resolve a document the caller may access, whatever its type.
    pub async fn resolve_owned(
        &self,
        raw_id: &str,
        ctx: &RequestContext,
    ) -> Result<DocumentIdentity, AppError> {
        let id = normalize_document_id(raw_id)?;
        let unclaimed = ctx.unclaimed_user_id();

        let session_user = if self.auth_enabled {
            let user_id = ctx
                .user_id
                .clone()
                .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;
            Some(user_id)
        } else {
            None
        };

        let mut owners = Vec::with_capacity(2);
        if let Some(ref user_id) = session_user {
            owners.push(user_id.clone());
        }
        if !owners.contains(&unclaimed) {
            owners.push(unclaimed.clone());
        }

        let rows = self
            .repository
            .find_for_owners(&id, ctx.namespace_str(), &owners)
            .await?;

        let record = pick_row(rows, session_user.as_deref()).ok_or_else(|| {
            tracing::debug!(document_id = %id, "No visible document row");
            AppError::NotFound(format!("Document {} not visible to caller", id))
        })?;

        let owner_user_id = if record.user_id == unclaimed {
            None
        } else {
            Some(record.user_id)
        };

        Ok(DocumentIdentity {
            id,
            owner_user_id,
            namespace: ctx.namespace.clone(),
            document_type: record.document_type,
            version: record.last_modified,
            source_key: record.source_key,
        })
    }
}

/// Prefer the session user's own row over the placeholder row.
fn pick_row(rows: Vec<DocumentRecord>, session_user: Option<&str>) -> Option<DocumentRecord> {
    let exact = session_user.and_then(|user_id| rows.iter().position(|r| r.user_id == user_id));
    match exact {
        Some(index) => rows.into_iter().nth(index),
        None => rows.into_iter().next(),
    }
}
