//! Lectern database library
//!
//! Document metadata repositories: the capability trait consumed by the resolver and
//! its PostgreSQL and in-memory implementations.

pub mod db;

pub use db::{
    DocumentRepository, MemoryDocumentRepository, PostgresDocumentRepository,
};
