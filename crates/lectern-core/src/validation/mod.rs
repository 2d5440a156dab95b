//! Validation modules

pub mod identifier;

pub use identifier::{
    normalize_document_id, normalize_namespace, MAX_ID_LENGTH, MAX_NAMESPACE_LENGTH,
    NO_NAMESPACE_SEGMENT,
};
