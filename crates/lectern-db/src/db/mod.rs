//! Database repositories for data access layer
//!
//! The backend is chosen once at startup (`DOCUMENT_STORE=postgres|memory`) and
//! handed to services as `Arc<dyn DocumentRepository>`.

pub mod document;
pub mod memory;

pub use document::{DocumentRepository, PostgresDocumentRepository};
pub use memory::MemoryDocumentRepository;
