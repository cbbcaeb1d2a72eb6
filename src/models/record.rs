//! Item record data structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A playable source listed in an item's playlist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    /// Playlist entry id (`0_0_*` dub, `0_1_*` sub)
    pub source_id: String,

    /// Display text of the entry
    pub label: String,

    /// Media file URL
    pub media_file: String,
}

/// Normalized state of one catalogue item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemRecord {
    /// Canonical URL of the detail page
    pub identifier: String,

    /// Display title
    pub title: String,

    /// Short description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Poster image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// Distinct subtitled episode numbers
    #[serde(default)]
    pub sub_count: u32,

    /// Distinct dubbed episode numbers
    #[serde(default)]
    pub dub_count: u32,

    /// Playlist sources in page order
    #[serde(default)]
    pub sources: Vec<Source>,

    /// Time of the last successful extraction
    pub last_updated: DateTime<Utc>,
}

impl ItemRecord {
    /// Create an empty record for an identifier.
    pub fn new(identifier: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            description: None,
            image_url: None,
            sub_count: 0,
            dub_count: 0,
            sources: Vec::new(),
            last_updated: Utc::now(),
        }
    }
}

/// Position of a scan inside the paginated listing.
///
/// Lives for a single orchestrator run and is never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanCursor {
    pub page_number: u32,
    pub consecutive_unchanged: u32,
}

impl ScanCursor {
    pub fn start() -> Self {
        Self {
            page_number: 1,
            consecutive_unchanged: 0,
        }
    }
}

impl Default for ScanCursor {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_skips_empty_optionals() {
        let record = ItemRecord::new("https://example.com/anime/1-a.html", "A");
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("description").is_none());
        assert!(json.get("image_url").is_none());
        assert_eq!(json["sub_count"], 0);
    }

    #[test]
    fn test_cursor_starts_at_first_page() {
        let cursor = ScanCursor::default();
        assert_eq!(cursor.page_number, 1);
        assert_eq!(cursor.consecutive_unchanged, 0);
    }
}
