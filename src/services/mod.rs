//! Service layer for the tracker.
//!
//! This module contains the site-facing logic for:
//! - Page fetching with retries (`Fetcher`)
//! - Listing page parsing (`ListingParser`)
//! - Detail page and playlist extraction (`DetailExtractor`)

pub mod details;
pub mod fetcher;
pub mod listing;
pub mod playlist;

use scraper::Selector;

use crate::error::{AppError, Result};

pub use details::{DetailExtractor, DetailPage, DetailParser, Extraction, SkipReason};
pub use fetcher::Fetcher;
pub use listing::{ListingEntry, ListingPage, ListingParser};
pub use playlist::{PlaylistSummary, PlaylistTokens};

pub(crate) fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
