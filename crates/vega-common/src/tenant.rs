use serde::{Deserialize, Serialize};
use std::fmt;

/// Resolved team identity that owns every persisted record.
///
/// Several authenticated callers may resolve to the same team, so storage is
/// always keyed by this value and never by the caller id directly.
///
/// # Examples
///
/// ```
/// use vega_common::tenant::TeamId;
///
/// let team = TeamId::new("team-42");
/// assert_eq!(team.as_str(), "team-42");
/// assert_eq!(team.to_string(), "team-42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(String);

impl TeamId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TeamId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TeamId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
