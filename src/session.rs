//! Session identity — the token that correlates wizard progress and relay calls.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for one onboarding attempt. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Use the caller-supplied identifier verbatim (e.g. a URL path segment),
    /// or mint a fresh random v4 UUID (122 random bits) when none is given.
    pub fn get_or_create(route_param: Option<&str>) -> Self {
        match route_param {
            Some(id) if !id.trim().is_empty() => Self(id.to_string()),
            _ => Self::generate(),
        }
    }

    /// Mint a new random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
