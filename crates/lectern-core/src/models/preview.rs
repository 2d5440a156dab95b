use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Client-visible state of a preview artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PreviewStatus {
    Missing,
    Queued,
    Ready,
    Error,
}

impl PreviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreviewStatus::Missing => "missing",
            PreviewStatus::Queued => "queued",
            PreviewStatus::Ready => "ready",
            PreviewStatus::Error => "error",
        }
    }
}
