use serde::{Deserialize, Serialize};
use std::fmt;

/// An identifier assigned by the external planning tool (e.g. `T-104`).
///
/// External ids are scoped: work items are unique per phase, phases per
/// project, projects per program. They are never minted by Cadence itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(String);

impl ExternalId {
    /// Create a new instance from a string value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Return the inner string as a str slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ExternalId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ExternalId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl std::ops::Deref for ExternalId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ExternalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_id_from_str() {
        let id = ExternalId::from("T-104");
        assert_eq!(id.as_str(), "T-104");
        assert_eq!(&*id, "T-104");
    }

    #[test]
    fn external_id_serde_roundtrip() {
        let id = ExternalId::new("PHS-2");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"PHS-2\"");
        let back: ExternalId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
