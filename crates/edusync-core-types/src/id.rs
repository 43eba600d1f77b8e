use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Opaque identifier for a Learning Unit.
///
/// Ids cross serialization boundaries in more than one shape (raw string,
/// wrapped object field), so every constructor funnels through one canonical
/// form: trimmed, ASCII-lowercased. Two `UnitId`s referring to the same unit
/// therefore always compare equal, which the relationship differ relies on to
/// avoid false removed+added pairs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct UnitId(String);

// Deserialization goes through `from_raw` so ids read off the wire are already
// canonical, whatever shape the producer emitted them in.
impl<'de> Deserialize<'de> for UnitId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(UnitId::from_raw(raw))
    }
}

impl UnitId {
    /// Mint a fresh identifier (UUID v4, canonical lowercase-hyphenated form).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Normalize an externally supplied identifier into the canonical form.
    pub fn from_raw(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_lowercase())
    }

    /// The canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(raw: &str) -> Self {
        Self::from_raw(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_normalizes() {
        let a = UnitId::from_raw("  ABC-123 ");
        let b = UnitId::from_raw("abc-123");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "abc-123");
    }

    #[test]
    fn test_generate_is_unique_and_canonical() {
        let a = UnitId::generate();
        let b = UnitId::generate();
        assert_ne!(a, b);
        assert_eq!(a, UnitId::from_raw(a.as_str()));
    }

    #[test]
    fn test_serde_transparent() {
        let id = UnitId::from_raw("unit-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"unit-1\"");
        let back: UnitId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_deserialize_normalizes() {
        let id: UnitId = serde_json::from_str("\"  AbC-9 \"").unwrap();
        assert_eq!(id.as_str(), "abc-9");
    }
}
