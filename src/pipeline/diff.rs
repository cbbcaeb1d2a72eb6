//! Change detection between two versions of an item record.
//!
//! Two separate questions are answered here:
//!
//! - [`has_changed`]: is the fresh record worth writing back? A coarse
//!   structural comparison of the episode counts and the number of sources.
//!   Title, description and image edits never count.
//! - [`classify_increase`]: did the item gain episodes, and in which variant?
//!   Used by record stores to decide whether to queue a change event.

use crate::models::{ChangeKind, ItemRecord};

/// Whether two records of the same item differ in a way that matters.
pub fn has_changed(old: &ItemRecord, new: &ItemRecord) -> bool {
    old.sub_count != new.sub_count
        || old.dub_count != new.dub_count
        || old.sources.len() != new.sources.len()
}

/// Whether a freshly extracted record should be written to the store.
///
/// An item seen for the first time always is.
pub fn needs_upsert(old: Option<&ItemRecord>, new: &ItemRecord) -> bool {
    old.is_none_or(|old| has_changed(old, new))
}

/// Which variant gained episodes compared to the stored record.
///
/// A record without a predecessor is compared against zero counts.
pub fn classify_increase(old: Option<&ItemRecord>, new: &ItemRecord) -> Option<ChangeKind> {
    let (old_sub, old_dub) = old.map_or((0, 0), |r| (r.sub_count, r.dub_count));
    let sub_up = new.sub_count > old_sub;
    let dub_up = new.dub_count > old_dub;

    match (sub_up, dub_up) {
        (true, true) => Some(ChangeKind::All),
        (true, false) => Some(ChangeKind::Sub),
        (false, true) => Some(ChangeKind::Dub),
        (false, false) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;

    fn make_record(sub: u32, dub: u32, sources: usize) -> ItemRecord {
        ItemRecord {
            sub_count: sub,
            dub_count: dub,
            sources: (0..sources)
                .map(|i| Source {
                    source_id: format!("0_1_{i}"),
                    label: format!("{i} серія"),
                    media_file: format!("https://cdn.example.com/{i}.m3u8"),
                })
                .collect(),
            ..ItemRecord::new("https://example.com/anime/1-a.html", "Title")
        }
    }

    #[test]
    fn test_cosmetic_edits_are_not_changes() {
        let old = make_record(3, 1, 4);
        let mut new = old.clone();
        new.title = "Another title".to_string();
        new.description = Some("New synopsis".to_string());
        new.image_url = Some("https://example.com/new.jpg".to_string());

        assert!(!has_changed(&old, &new));
    }

    #[test]
    fn test_count_changes() {
        let old = make_record(3, 1, 4);
        assert!(has_changed(&old, &make_record(4, 1, 4)));
        assert!(has_changed(&old, &make_record(3, 0, 4)));
    }

    #[test]
    fn test_source_length_change() {
        let old = make_record(3, 1, 4);
        assert!(has_changed(&old, &make_record(3, 1, 5)));
    }

    #[test]
    fn test_source_contents_are_not_compared() {
        let old = make_record(3, 1, 2);
        let mut new = old.clone();
        new.sources[0].media_file = "https://mirror.example.com/0.m3u8".to_string();
        assert!(!has_changed(&old, &new));
    }

    #[test]
    fn test_first_sight_needs_upsert() {
        let new = make_record(0, 0, 0);
        assert!(needs_upsert(None, &new));
        assert!(!needs_upsert(Some(&new.clone()), &new));
    }

    #[test]
    fn test_classify_increase() {
        let old = make_record(3, 1, 4);
        assert_eq!(classify_increase(Some(&old), &make_record(4, 1, 5)), Some(ChangeKind::Sub));
        assert_eq!(classify_increase(Some(&old), &make_record(3, 2, 5)), Some(ChangeKind::Dub));
        assert_eq!(classify_increase(Some(&old), &make_record(5, 2, 7)), Some(ChangeKind::All));
        // Decreases and source-only changes are not announced.
        assert_eq!(classify_increase(Some(&old), &make_record(2, 1, 4)), None);
        assert_eq!(classify_increase(Some(&old), &make_record(3, 1, 9)), None);
    }

    #[test]
    fn test_classify_first_sight() {
        assert_eq!(classify_increase(None, &make_record(2, 0, 2)), Some(ChangeKind::Sub));
        assert_eq!(classify_increase(None, &make_record(0, 0, 0)), None);
    }
}
