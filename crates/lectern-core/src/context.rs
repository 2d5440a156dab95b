//! Per-request context.
//!
//! The HTTP boundary builds one [`RequestContext`] per request (session user, tenancy
//! namespace, request id) and threads it through every service call. Nothing below
//! the boundary reads headers or the environment to rediscover these values.

use crate::error::AppError;
use crate::validation::normalize_namespace;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Owner id of documents created without a session, when no namespace is set.
pub const UNCLAIMED_USER_ID: &str = "unclaimed";

/// Validated tenancy / test-isolation tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        normalize_namespace(raw).map(Namespace)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

/// Deterministic placeholder owner for unclaimed documents in a namespace.
///
/// Anonymous traffic in different namespaces never shares an owner.
pub fn unclaimed_user_id(namespace: Option<&Namespace>) -> String {
    match namespace {
        Some(ns) => format!("{}::{}", UNCLAIMED_USER_ID, ns.as_str()),
        None => UNCLAIMED_USER_ID.to_string(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: Option<String>,
    /// Authenticated session user, if any.
    pub user_id: Option<String>,
    pub namespace: Option<Namespace>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = Some(namespace);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn namespace_str(&self) -> Option<&str> {
        self.namespace.as_ref().map(Namespace::as_str)
    }

    pub fn unclaimed_user_id(&self) -> String {
        unclaimed_user_id(self.namespace.as_ref())
    }
}
