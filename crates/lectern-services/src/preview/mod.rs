//! Preview generation and delivery
//!
//! - `claims`: the in-memory claim table guaranteeing one generation per key
//! - `converter`: the pluggable document-to-preview converter
//! - `queue`: bounded background generation queue and its worker
//! - `coordinator`: ensure / fetch / purge state machine
//! - `delivery`: presigned direct URLs with a streamed fallback

mod claims;
mod converter;
mod coordinator;
mod delivery;
mod queue;

pub use claims::{ClaimState, ClaimTable};
pub use converter::{CommandConverter, ConversionError, PreviewConverter, UnconfiguredConverter};
pub use coordinator::{EnsureOutcome, FetchOutcome, PendingPreview, PreviewCoordinator};
pub use delivery::{Delivery, PresignedDelivery, PreviewReport, StreamDelivery};
pub use queue::{GenerationJob, GenerationQueue, GenerationWorker, QueueError};
