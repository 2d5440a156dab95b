//! Rekeys legacy directories from their old id to the current document id.
//!
//! For every mapping and every legacy family the source directory is renamed when the
//! destination is free, or merged into it file by file when it is not. Existing files
//! always win. The walk is not transactional; re-running it resumes where it stopped.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use lectern_core::models::{KindReport, LegacyKind, LegacyMapping, MigrationReport, RekeyTally};
use lectern_core::validation::normalize_document_id;
use lectern_core::AppError;
use tokio::fs;

/// Upper bound on mappings accepted per call.
pub const MAX_MAPPINGS: usize = 1000;

/// What happened to one entry during a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeOutcome {
    Moved,
    Skipped,
    Recursed,
}

#[derive(Debug, Default)]
struct MergeTally {
    moved: u64,
    skipped: u64,
    recursed: u64,
}

impl MergeTally {
    fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Moved => self.moved += 1,
            MergeOutcome::Skipped => self.skipped += 1,
            MergeOutcome::Recursed => self.recursed += 1,
        }
    }
}

/// Validate and normalize every mapping before any path is built from it.
pub fn validate_mappings(mappings: &[LegacyMapping]) -> Result<Vec<LegacyMapping>, AppError> {
    if mappings.len() > MAX_MAPPINGS {
        return Err(AppError::InvalidMapping(format!(
            "At most {} mappings are accepted per call",
            MAX_MAPPINGS
        )));
    }

    mappings
        .iter()
        .enumerate()
        .map(|(index, mapping)| {
            let invalid = |field: &str| {
                AppError::InvalidMapping(format!("Mapping {} has an invalid {}", index, field))
            };
            Ok(LegacyMapping {
                old_id: normalize_document_id(&mapping.old_id).map_err(|_| invalid("oldId"))?,
                id: normalize_document_id(&mapping.id).map_err(|_| invalid("id"))?,
            })
        })
        .collect()
}

pub struct LegacyMigrationMerger {
    root: PathBuf,
}

impl LegacyMigrationMerger {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_path(&self, kind: LegacyKind, id: &str) -> PathBuf {
        self.root.join(kind.root_dir()).join(kind.entry_dir(id))
    }

    /// Rekey every mapping in both legacy families.
    ///
    /// Only an invalid mapping list fails the call; per-entry I/O failures are logged
    /// and counted as skipped.
    #[tracing::instrument(skip(self, mappings), fields(root = %self.root.display(), mappings = mappings.len()))]
    pub async fn migrate(&self, mappings: &[LegacyMapping]) -> Result<MigrationReport, AppError> {
        let mappings = validate_mappings(mappings)?;
        let start = std::time::Instant::now();

        let mut report = MigrationReport::default();
        for kind in LegacyKind::ALL {
            let mut tally = RekeyTally::default();
            for mapping in mappings.iter().filter(|m| m.old_id != m.id) {
                let src = self.entry_path(kind, &mapping.old_id);
                let dst = self.entry_path(kind, &mapping.id);
                tally.absorb(rekey_dir(&src, &dst).await);
            }

            let mut ready = true;
            for mapping in mappings.iter().filter(|m| m.old_id != m.id) {
                if is_dir(&self.entry_path(kind, &mapping.old_id)).await {
                    ready = false;
                    break;
                }
            }

            let kind_report = KindReport { tally, ready };
            match kind {
                LegacyKind::Documents => report.documents = kind_report,
                LegacyKind::Audiobooks => report.audiobooks = kind_report,
            }
        }

        let rekey = report.rekey();
        tracing::info!(
            renamed = rekey.renamed,
            merged = rekey.merged,
            skipped = rekey.skipped,
            documents_ready = report.documents.ready,
            audiobooks_ready = report.audiobooks.ready,
            duration_ms = start.elapsed().as_millis(),
            "Legacy migration finished"
        );

        Ok(report)
    }
}

async fn is_dir(path: &Path) -> bool {
    matches!(fs::symlink_metadata(path).await, Ok(meta) if meta.is_dir())
}

async fn exists(path: &Path) -> std::io::Result<bool> {
    match fs::symlink_metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Move one legacy directory onto its new name.
async fn rekey_dir(src: &Path, dst: &Path) -> RekeyTally {
    let mut tally = RekeyTally::default();
    if !is_dir(src).await {
        return tally;
    }

    let destination = match exists(dst).await {
        Ok(true) => Ok(Some(is_dir(dst).await)),
        Ok(false) => Ok(None),
        Err(e) => Err(e),
    };

    match destination {
        Ok(None) => match fs::rename(src, dst).await {
            Ok(()) => {
                tracing::debug!(src = %src.display(), dst = %dst.display(), "Renamed legacy directory");
                tally.renamed += 1;
            }
            Err(e) => {
                tracing::warn!(src = %src.display(), error = %e, "Failed to rename legacy directory");
                tally.skipped += 1;
            }
        },
        Ok(Some(true)) => {
            let mut merge = MergeTally::default();
            merge_tree(src, dst, &mut merge).await;
            // Best effort: fails while retained files remain.
            let _ = fs::remove_dir(src).await;
            tracing::debug!(
                src = %src.display(),
                dst = %dst.display(),
                moved = merge.moved,
                skipped = merge.skipped,
                recursed = merge.recursed,
                "Merged legacy directory"
            );
            tally.merged += 1;
            tally.skipped += merge.skipped;
        }
        Ok(Some(false)) => {
            tracing::warn!(dst = %dst.display(), "Destination exists and is not a directory");
            tally.skipped += 1;
        }
        Err(e) => {
            tracing::warn!(dst = %dst.display(), error = %e, "Failed to inspect destination");
            tally.skipped += 1;
        }
    }

    tally
}

/// Depth-first merge of `src` into the existing directory `dst`.
fn merge_tree<'a>(src: &'a Path, dst: &'a Path, tally: &'a mut MergeTally) -> BoxFuture<'a, ()> {
    Box::pin(async move {
        let mut entries = match fs::read_dir(src).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(src = %src.display(), error = %e, "Failed to read legacy directory");
                tally.record(MergeOutcome::Skipped);
                return;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(src = %src.display(), error = %e, "Failed to list legacy directory");
                    tally.record(MergeOutcome::Skipped);
                    break;
                }
            };
            let from = entry.path();
            let to = dst.join(entry.file_name());
            let outcome = merge_entry(&from, &to, tally).await;
            tally.record(outcome);
        }
    })
}

async fn merge_entry(src: &Path, dst: &Path, tally: &mut MergeTally) -> MergeOutcome {
    if is_dir(src).await {
        match exists(dst).await {
            Ok(true) => {
                if !is_dir(dst).await {
                    return MergeOutcome::Skipped;
                }
            }
            Ok(false) => {
                if let Err(e) = fs::create_dir(dst).await {
                    tracing::warn!(dst = %dst.display(), error = %e, "Failed to create directory");
                    return MergeOutcome::Skipped;
                }
            }
            Err(e) => {
                tracing::warn!(dst = %dst.display(), error = %e, "Failed to inspect destination");
                return MergeOutcome::Skipped;
            }
        }
        merge_tree(src, dst, tally).await;
        let _ = fs::remove_dir(src).await;
        return MergeOutcome::Recursed;
    }

    // Linking fails atomically when the destination exists, so nothing is overwritten.
    match fs::hard_link(src, dst).await {
        Ok(()) => match fs::remove_file(src).await {
            Ok(()) => MergeOutcome::Moved,
            Err(e) => {
                tracing::warn!(src = %src.display(), error = %e, "Failed to remove merged file");
                MergeOutcome::Moved
            }
        },
        Err(e) if e.kind() == ErrorKind::AlreadyExists => MergeOutcome::Skipped,
        Err(e) => {
            tracing::warn!(src = %src.display(), dst = %dst.display(), error = %e, "Failed to move file");
            MergeOutcome::Skipped
        }
    }
}
