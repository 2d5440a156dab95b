//! API constants.

/// Every route except the OpenAPI document lives under this prefix.
pub const API_PREFIX: &str = "/api/v0";

/// Request header carrying the tenancy / test-isolation namespace.
pub const NAMESPACE_HEADER: &str = "X-Lectern-Namespace";

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Upper bound on request bodies; only the migrate endpoint accepts one.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

