// src/services/details.rs

//! Detail page extraction.
//!
//! Turns one item's detail page into an [`ItemRecord`], following the
//! embedded session tokens to the AJAX playlist when they are present.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use scraper::{Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ItemRecord, SiteConfig};
use crate::services::fetcher::Fetcher;
use crate::services::parse_selector;
use crate::services::playlist::{self, PlaylistSummary, PlaylistTokens};
use crate::utils::{normalize_whitespace, resolve_url};

/// Why an item was left out of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The detail link could not be resolved to a URL
    InvalidUrl(String),
    /// The detail page could not be fetched
    Fetch(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InvalidUrl(msg) => write!(f, "invalid detail URL: {msg}"),
            SkipReason::Fetch(msg) => write!(f, "detail fetch failed: {msg}"),
        }
    }
}

/// Outcome of extracting one detail page.
#[derive(Debug, Clone)]
pub enum Extraction {
    Extracted(ItemRecord),
    Skipped(SkipReason),
}

/// Fields scraped from a detail page before the playlist lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailPage {
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub tokens: Option<PlaylistTokens>,
    /// Value of the episode count label, if the page shows one
    pub episode_count: Option<u32>,
}

/// Compiled selectors and patterns for detail pages.
pub struct DetailParser {
    description: Selector,
    image: Selector,
    news_id: Selector,
    news_id_attr: String,
    playlist_entry: Selector,
    login_hash_re: Regex,
    news_id_re: Regex,
    episode_count_re: Regex,
}

impl DetailParser {
    pub fn new(site: &SiteConfig) -> Result<Self> {
        Ok(Self {
            description: parse_selector(&site.description_selector)?,
            image: parse_selector(&site.image_selector)?,
            news_id: parse_selector(&site.news_id_selector)?,
            news_id_attr: site.news_id_attr.clone(),
            playlist_entry: parse_selector(&site.playlist_entry_selector)?,
            login_hash_re: Regex::new(&site.login_hash_pattern)?,
            news_id_re: Regex::new(&site.news_id_pattern)?,
            episode_count_re: Regex::new(&site.episode_count_pattern)?,
        })
    }

    /// Scrape description, image, playlist tokens and the episode count label.
    pub fn parse_page(&self, html: &str, base: &Url) -> DetailPage {
        let document = Html::parse_document(html);

        let description = document
            .select(&self.description)
            .next()
            .map(|el| normalize_whitespace(&el.text().collect::<String>()))
            .filter(|text| !text.is_empty());

        let image_url = document
            .select(&self.image)
            .next()
            .and_then(|el| el.value().attr("src").or_else(|| el.value().attr("data-src")))
            .map(str::trim)
            .filter(|src| !src.is_empty())
            .map(|src| {
                if src.starts_with('/') {
                    resolve_url(base, src)
                } else {
                    src.to_string()
                }
            });

        let user_hash = self.capture(&self.login_hash_re, html);
        let news_id = document
            .select(&self.news_id)
            .find_map(|el| el.value().attr(&self.news_id_attr))
            .map(str::trim)
            .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
            .map(str::to_string)
            .or_else(|| self.capture(&self.news_id_re, html));

        let tokens = match (news_id, user_hash) {
            (Some(news_id), Some(user_hash)) => Some(PlaylistTokens { news_id, user_hash }),
            _ => None,
        };

        let page_text = normalize_whitespace(&document.root_element().text().collect::<String>());
        let episode_count = self
            .capture(&self.episode_count_re, &page_text)
            .and_then(|count| count.parse().ok());

        DetailPage {
            description,
            image_url,
            tokens,
            episode_count,
        }
    }

    /// Parse a playlist fragment with the configured entry selector.
    pub fn parse_playlist(&self, fragment: &str) -> PlaylistSummary {
        playlist::parse_playlist(fragment, &self.playlist_entry)
    }

    fn capture(&self, re: &Regex, haystack: &str) -> Option<String> {
        re.captures(haystack)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

/// Extracts item records from detail pages.
pub struct DetailExtractor {
    fetcher: Arc<Fetcher>,
    parser: DetailParser,
    playlist_path: String,
}

impl DetailExtractor {
    pub fn new(fetcher: Arc<Fetcher>, site: &SiteConfig) -> Result<Self> {
        Ok(Self {
            fetcher,
            parser: DetailParser::new(site)?,
            playlist_path: site.playlist_path.clone(),
        })
    }

    /// Extract the record for one detail page.
    ///
    /// Never fails: problems with the detail page itself are reported as
    /// [`Extraction::Skipped`], problems with the playlist fall back to the
    /// episode count label.
    pub async fn extract(&self, url: &str, title: &str) -> Extraction {
        let identifier = match crate::utils::canonical_url(self.fetcher.base_url(), url) {
            Some(identifier) => identifier,
            None => {
                log::warn!("Skipping '{}': cannot resolve detail URL '{}'", title, url);
                return Extraction::Skipped(SkipReason::InvalidUrl(url.to_string()));
            }
        };

        let html = match self.fetcher.get(&identifier).await {
            Ok(html) => html,
            Err(e) => {
                log::warn!("Skipping '{}' ({}): {}", title, identifier, e);
                return Extraction::Skipped(SkipReason::Fetch(e.to_string()));
            }
        };

        let page = self.parser.parse_page(&html, self.fetcher.base_url());

        let mut summary = match &page.tokens {
            Some(tokens) => self.fetch_playlist(&identifier, tokens).await,
            None => {
                log::debug!("No playlist tokens on {}", identifier);
                PlaylistSummary::default()
            }
        };

        if summary.sub_count == 0 && summary.dub_count == 0 {
            if let Some(count) = page.episode_count {
                log::debug!("Using episode count label ({}) for {}", count, identifier);
                summary.dub_count = count;
            }
        }

        Extraction::Extracted(ItemRecord {
            identifier,
            title: normalize_whitespace(title),
            description: page.description,
            image_url: page.image_url,
            sub_count: summary.sub_count,
            dub_count: summary.dub_count,
            sources: summary.sources,
            last_updated: Utc::now(),
        })
    }

    /// Fetch and parse the AJAX playlist; any failure means "no playlist".
    async fn fetch_playlist(&self, referer: &str, tokens: &PlaylistTokens) -> PlaylistSummary {
        match self.try_fetch_playlist(referer, tokens).await {
            Ok(Some(fragment)) => self.parser.parse_playlist(&fragment),
            Ok(None) => {
                log::debug!("No playlist available for {}", referer);
                PlaylistSummary::default()
            }
            Err(e) => {
                log::warn!("Playlist fetch failed for {}: {}", referer, e);
                PlaylistSummary::default()
            }
        }
    }

    async fn try_fetch_playlist(
        &self,
        referer: &str,
        tokens: &PlaylistTokens,
    ) -> Result<Option<String>> {
        let mut url = self.fetcher.resolve(&self.playlist_path)?;
        url.query_pairs_mut()
            .append_pair("news_id", &tokens.news_id)
            .append_pair("xfield", "playlist")
            .append_pair("user_hash", &tokens.user_hash);

        let mut headers = HeaderMap::new();
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
        headers.insert(
            REFERER,
            HeaderValue::from_str(referer).map_err(|e| AppError::validation(e.to_string()))?,
        );

        let body = self
            .fetcher
            .fetch(url.as_str(), &headers, self.fetcher.max_retries())
            .await?;
        Ok(playlist::decode_payload(&body))
    }
}
