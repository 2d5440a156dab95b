//! Lectern services
//!
//! Business logic of the preview pipeline and the legacy store migration. Every
//! service receives its collaborators (repository, blob store, converter) through its
//! constructor; nothing here reads configuration or request headers.

pub mod identity;
pub mod migration;
pub mod preview;

pub use identity::DocumentResolver;
pub use migration::LegacyMigrationMerger;
pub use preview::{
    ClaimState, ClaimTable, CommandConverter, ConversionError, Delivery, EnsureOutcome,
    FetchOutcome, GenerationJob, GenerationQueue, GenerationWorker, PendingPreview,
    PresignedDelivery, PreviewConverter, PreviewCoordinator, PreviewReport, StreamDelivery,
    UnconfiguredConverter,
};
