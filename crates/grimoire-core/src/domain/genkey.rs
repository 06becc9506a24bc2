//! Generation key type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque client-supplied correlation id for one logical generation request.
///
/// A key follows its request across admission, generation, polled checking,
/// and abort. The empty string is a reserved sentinel meaning "no key"
/// (legacy single-user clients that never poll concurrently). At most one
/// key is *current* (actively generating) at any time; any number may be
/// queued behind it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenKey(String);

impl GenKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The reserved legacy "no key" sentinel.
    #[must_use]
    pub const fn none() -> Self {
        Self(String::new())
    }

    /// True when this is the legacy single-user sentinel.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for GenKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for GenKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl fmt::Display for GenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
