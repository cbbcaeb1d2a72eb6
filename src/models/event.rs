//! Change events queued for delivery.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Which variant of an item gained episodes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Sub,
    Dub,
    All,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Sub => "sub",
            ChangeKind::Dub => "dub",
            ChangeKind::All => "all",
        };
        f.pad(s)
    }
}

/// A queued "item changed" notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Hex SHA-256 of identifier, kind and creation time
    pub id: String,
    pub identifier: String,
    pub title: String,
    pub kind: ChangeKind,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub processed: bool,
}

impl ChangeEvent {
    pub fn new(identifier: &str, title: &str, kind: ChangeKind) -> Self {
        let created_at = Utc::now();
        Self {
            id: event_id(identifier, kind, &created_at),
            identifier: identifier.to_string(),
            title: title.to_string(),
            kind,
            created_at,
            processed: false,
        }
    }
}

fn event_id(identifier: &str, kind: ChangeKind, created_at: &DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identifier.as_bytes());
    hasher.update(kind.to_string().as_bytes());
    hasher.update(created_at.to_rfc3339().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ChangeKind::All).unwrap(), "\"all\"");
        assert_eq!(ChangeKind::Dub.to_string(), "dub");
    }

    #[test]
    fn test_event_id_is_hex_sha256() {
        let event = ChangeEvent::new("https://example.com/a", "A", ChangeKind::Sub);
        assert_eq!(event.id.len(), 64);
        assert!(event.id.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!event.processed);
    }
}
