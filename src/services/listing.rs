// src/services/listing.rs

//! Listing page parsing.

use scraper::{ElementRef, Html, Selector};

use crate::error::Result;
use crate::models::SiteConfig;
use crate::services::parse_selector;
use crate::utils::normalize_whitespace;

/// One usable item of a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Detail link as written in the markup (may be relative)
    pub link: String,
    pub title: String,
}

/// Items found on one listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Number of item elements, usable or not
    pub item_count: usize,
    /// Items that carry both a link and a title, in page order
    pub entries: Vec<ListingEntry>,
}

impl ListingPage {
    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }
}

/// Compiled selectors for listing pages.
pub struct ListingParser {
    item: Selector,
    link: Selector,
    title: Selector,
}

impl ListingParser {
    pub fn new(site: &SiteConfig) -> Result<Self> {
        Ok(Self {
            item: parse_selector(&site.item_selector)?,
            link: parse_selector(&site.link_selector)?,
            title: parse_selector(&site.title_selector)?,
        })
    }

    /// Parse a listing page.
    pub fn parse(&self, html: &str) -> ListingPage {
        let document = Html::parse_document(html);
        let mut page = ListingPage::default();

        for item in document.select(&self.item) {
            page.item_count += 1;
            match self.parse_item(&item) {
                Some(entry) => page.entries.push(entry),
                None => log::debug!("Listing item #{} has no link or title", page.item_count),
            }
        }
        page
    }

    fn parse_item(&self, item: &ElementRef) -> Option<ListingEntry> {
        let link = item
            .select(&self.link)
            .find_map(|el| el.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())?;

        let title = item
            .select(&self.title)
            .next()
            .map(|el| normalize_whitespace(&el.text().collect::<String>()))
            .filter(|title| !title.is_empty())?;

        Some(ListingEntry {
            link: link.to_string(),
            title,
        })
    }
}
