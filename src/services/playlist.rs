// src/services/playlist.rs

//! Playlist payload decoding and episode classification.
//!
//! The AJAX endpoint answers `{ "success": bool, "response": "<html>" }`.
//! Each entry of the HTML fragment carries a `data-id` whose prefix names the
//! variant (`0_0_` dub, `0_1_` sub) and a `data-file` with the media URL.

use std::collections::HashSet;

use scraper::{Html, Selector};
use serde::Deserialize;

use crate::models::Source;

const DUB_PREFIX: &str = "0_0_";
const SUB_PREFIX: &str = "0_1_";

/// Raw JSON answer of the playlist endpoint.
#[derive(Debug, Deserialize)]
struct PlaylistResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    response: Option<String>,
}

/// Tokens scraped from a detail page that unlock the playlist endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistTokens {
    pub news_id: String,
    pub user_hash: String,
}

/// Counts and sources derived from a playlist fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistSummary {
    pub sub_count: u32,
    pub dub_count: u32,
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    Dub,
    Sub,
}

impl Variant {
    fn of(source_id: &str) -> Option<Self> {
        if source_id.starts_with(DUB_PREFIX) {
            Some(Variant::Dub)
        } else if source_id.starts_with(SUB_PREFIX) {
            Some(Variant::Sub)
        } else {
            None
        }
    }
}

/// Extract the HTML fragment from a playlist response body.
///
/// Returns `None` for `success: false`, an empty or missing `response`, or a
/// body that is not the expected JSON shape.
pub fn decode_payload(body: &str) -> Option<String> {
    let payload: PlaylistResponse = match serde_json::from_str(body) {
        Ok(payload) => payload,
        Err(e) => {
            log::debug!("Playlist payload is not valid JSON: {}", e);
            return None;
        }
    };

    if !payload.success {
        return None;
    }
    payload.response.filter(|html| !html.trim().is_empty())
}

/// Episode number of an entry label: its leading digit run, or the whole
/// label when it does not start with a digit.
pub fn episode_number(label: &str) -> &str {
    let label = label.trim();
    let end = label
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(label.len(), |(i, _)| i);

    if end == 0 { label } else { &label[..end] }
}

/// Parse a playlist fragment into per-variant episode counts and sources.
pub fn parse_playlist(fragment: &str, entry_selector: &Selector) -> PlaylistSummary {
    let document = Html::parse_fragment(fragment);
    let mut sub_episodes: HashSet<String> = HashSet::new();
    let mut dub_episodes: HashSet<String> = HashSet::new();
    let mut sources = Vec::new();

    for entry in document.select(entry_selector) {
        let element = entry.value();
        let (Some(source_id), Some(media_file)) = (element.attr("data-id"), element.attr("data-file"))
        else {
            continue;
        };

        let label = crate::utils::normalize_whitespace(&entry.text().collect::<String>());
        let episode = episode_number(&label).to_string();

        match Variant::of(source_id) {
            Some(Variant::Dub) => {
                dub_episodes.insert(episode);
            }
            Some(Variant::Sub) => {
                sub_episodes.insert(episode);
            }
            None => {}
        }

        sources.push(Source {
            source_id: source_id.to_string(),
            label,
            media_file: media_file.to_string(),
        });
    }

    PlaylistSummary {
        sub_count: sub_episodes.len() as u32,
        dub_count: dub_episodes.len() as u32,
        sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries_selector() -> Selector {
        Selector::parse(".playlists-videos li").unwrap()
    }

    fn fragment(entries: &[(&str, &str)]) -> String {
        let items: String = entries
            .iter()
            .map(|(id, text)| {
                format!(r#"<li data-id="{id}" data-file="https://cdn.example.com/{id}.m3u8">{text}</li>"#)
            })
            .collect();
        format!(
            r#"<div class="playlists-ajax">
                <div class="playlists-lists"><ul><li data-id="0_0">Озвучення</li><li data-id="0_1">Субтитри</li></ul></div>
                <div class="playlists-videos"><ul>{items}</ul></div>
            </div>"#
        )
    }

    #[test]
    fn test_episode_number() {
        assert_eq!(episode_number("12 серія"), "12");
        assert_eq!(episode_number("  3"), "3");
        assert_eq!(episode_number("OVA"), "OVA");
        assert_eq!(episode_number("  Фільм  "), "Фільм");
    }

    #[test]
    fn test_duplicate_episode_collapses() {
        let html = fragment(&[("0_1_1", "1 episode"), ("0_1_1b", "1 alt")]);
        let summary = parse_playlist(&html, &entries_selector());
        assert_eq!(summary.sub_count, 1);
        assert_eq!(summary.dub_count, 0);
        // Both streams are kept as sources.
        assert_eq!(summary.sources.len(), 2);
    }

    #[test]
    fn test_counts_per_variant() {
        let html = fragment(&[("0_0_1", "1 серія"), ("0_1_1", "1 серія"), ("0_1_2", "2 серія")]);
        let summary = parse_playlist(&html, &entries_selector());
        assert_eq!(summary.dub_count, 1);
        assert_eq!(summary.sub_count, 2);
        assert_eq!(summary.sources.len(), 3);
        assert_eq!(summary.sources[2].label, "2 серія");
    }

    #[test]
    fn test_unknown_prefix_kept_as_source_only() {
        let html = fragment(&[("0_2_1", "1 серія"), ("0_0_1", "1 серія")]);
        let summary = parse_playlist(&html, &entries_selector());
        assert_eq!(summary.dub_count, 1);
        assert_eq!(summary.sub_count, 0);
        assert_eq!(summary.sources.len(), 2);
        assert_eq!(summary.sources[0].source_id, "0_2_1");
    }

    #[test]
    fn test_entries_without_file_are_ignored() {
        let html = r#"<div class="playlists-videos"><ul>
            <li data-id="0_0_1">1 серія</li>
            <li data-file="https://cdn.example.com/x.m3u8">2 серія</li>
        </ul></div>"#;
        let summary = parse_playlist(html, &entries_selector());
        assert_eq!(summary, PlaylistSummary::default());
    }

    #[test]
    fn test_decode_payload() {
        assert_eq!(
            decode_payload(r#"{"success":true,"response":"<ul></ul>"}"#).as_deref(),
            Some("<ul></ul>")
        );
        assert_eq!(decode_payload(r#"{"success":false,"response":"<ul></ul>"}"#), None);
        assert_eq!(decode_payload(r#"{"success":true,"response":"  "}"#), None);
        assert_eq!(decode_payload(r#"{"success":true}"#), None);
        assert_eq!(decode_payload("<html>blocked</html>"), None);
    }
}
