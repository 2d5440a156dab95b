//! Legacy store migration

mod merger;

pub use merger::{validate_mappings, LegacyMigrationMerger, MAX_MAPPINGS};
