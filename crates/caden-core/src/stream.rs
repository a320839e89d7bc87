//! Stream identifiers.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of independently polled remote state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// The watched owner's leveraged position.
    Position,
    /// Market quote: oracle, far leg, per-asset prices, slot.
    Market,
    /// The watched owner's settlement instruments.
    Holdings,
    /// Every leveraged position of the program (liquidation input).
    Accounts,
}

impl StreamKind {
    pub const ALL: [StreamKind; 4] = [
        StreamKind::Position,
        StreamKind::Market,
        StreamKind::Holdings,
        StreamKind::Accounts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Market => "market",
            Self::Holdings => "holdings",
            Self::Accounts => "accounts",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| CoreError::InvalidStreamKey(s.to_string()))
    }
}

/// Unique key of one stream instance, e.g. `position:<owner>`.
///
/// Per-owner streams carry the owner in the key so two sessions watching
/// different wallets never share cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamKey(String);

impl StreamKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key for a stream scoped to one owner.
    pub fn scoped(kind: StreamKind, scope: impl fmt::Display) -> Self {
        Self(format!("{}:{}", kind, scope))
    }

    /// Key for a program-wide stream.
    pub fn global(kind: StreamKind) -> Self {
        Self(kind.as_str().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Stream kind encoded in the key prefix, if any.
    pub fn kind(&self) -> Option<StreamKind> {
        let prefix = self.0.split(':').next().unwrap_or_default();
        prefix.parse().ok()
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_key_roundtrips_kind() {
        let key = StreamKey::scoped(StreamKind::Position, "Owner111");
        assert_eq!(key.as_str(), "position:Owner111");
        assert_eq!(key.kind(), Some(StreamKind::Position));
    }

    #[test]
    fn test_global_key() {
        let key = StreamKey::global(StreamKind::Market);
        assert_eq!(key.to_string(), "market");
        assert_eq!(key.kind(), Some(StreamKind::Market));
    }

    #[test]
    fn test_unknown_kind() {
        assert!("orders".parse::<StreamKind>().is_err());
        assert_eq!(StreamKey::new("orders:x").kind(), None);
    }
}
