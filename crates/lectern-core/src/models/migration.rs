use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Rename from the legacy keying scheme to the current document id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LegacyMapping {
    pub old_id: String,
    pub id: String,
}

/// Directory families in the legacy store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyKind {
    /// `documents/{id}/`
    Documents,
    /// `audiobooks/{id}-audiobook/`
    Audiobooks,
}

impl LegacyKind {
    pub const ALL: [LegacyKind; 2] = [LegacyKind::Documents, LegacyKind::Audiobooks];

    pub fn root_dir(&self) -> &'static str {
        match self {
            LegacyKind::Documents => "documents",
            LegacyKind::Audiobooks => "audiobooks",
        }
    }

    /// Directory name holding the files of `id` inside [`Self::root_dir`].
    pub fn entry_dir(&self, id: &str) -> String {
        match self {
            LegacyKind::Documents => id.to_string(),
            LegacyKind::Audiobooks => format!("{}-audiobook", id),
        }
    }
}

/// Counts folded from a rekey run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RekeyTally {
    /// Source directories renamed onto a free destination.
    pub renamed: u64,
    /// Source directories merged into an existing destination.
    pub merged: u64,
    /// Files left in place because the destination already had them (or could not be moved).
    pub skipped: u64,
}

impl RekeyTally {
    pub fn absorb(&mut self, other: RekeyTally) {
        self.renamed += other.renamed;
        self.merged += other.merged;
        self.skipped += other.skipped;
    }

    pub fn migrated(&self) -> u64 {
        self.renamed + self.merged
    }
}

/// Per-family outcome of a migration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindReport {
    pub tally: RekeyTally,
    /// No legacy-keyed source directory of this family remains for the mappings.
    pub ready: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub documents: KindReport,
    pub audiobooks: KindReport,
}

impl MigrationReport {
    /// Combined counts across both families.
    pub fn rekey(&self) -> RekeyTally {
        let mut total = self.documents.tally;
        total.absorb(self.audiobooks.tally);
        total
    }
}
