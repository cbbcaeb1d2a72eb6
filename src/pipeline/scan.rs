// src/pipeline/scan.rs

//! Single listing page scan.
//!
//! Fetches one listing page, extracts every item on it in page order and
//! writes changed records to the store. The unchanged counter carried in the
//! [`ScanCursor`] implements early termination: once enough consecutive items
//! come back unchanged, everything further down the catalogue is assumed to
//! be unchanged too.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::models::{Config, ScanCursor, SiteConfig};
use crate::pipeline::diff::needs_upsert;
use crate::services::{DetailExtractor, Extraction, Fetcher, ListingEntry, ListingParser};
use crate::storage::RecordStore;

/// How a page scan ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageStatus {
    /// Every item was visited; the next page may be scanned
    Scanned,
    /// The page had no items or does not exist
    EndOfListing,
    /// The unchanged counter reached the limit
    LimitReached,
    /// The page could not be scanned; the cursor is left as it was
    Failed(String),
}

/// Result of scanning one listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageScan {
    /// Items written to the store on this page
    pub items_processed: u32,
    pub cursor: ScanCursor,
    pub status: PageStatus,
}

impl PageScan {
    /// Whether the run should end after this page.
    pub fn should_stop(&self) -> bool {
        matches!(
            self.status,
            PageStatus::EndOfListing | PageStatus::LimitReached
        )
    }
}

/// Scans listing pages item by item.
pub struct PageScanner {
    fetcher: Arc<Fetcher>,
    extractor: DetailExtractor,
    listing: ListingParser,
    store: Arc<dyn RecordStore>,
    site: SiteConfig,
    item_delay: Duration,
}

impl PageScanner {
    pub fn new(config: &Config, fetcher: Arc<Fetcher>, store: Arc<dyn RecordStore>) -> Result<Self> {
        Ok(Self {
            extractor: DetailExtractor::new(Arc::clone(&fetcher), &config.site)?,
            listing: ListingParser::new(&config.site)?,
            fetcher,
            store,
            site: config.site.clone(),
            item_delay: config.scan.item_delay(),
        })
    }

    /// Scan one listing page starting from `cursor`.
    ///
    /// Never fails as a whole: fetch and store problems are reported through
    /// [`PageStatus::Failed`] so the caller decides whether to retry.
    pub async fn scan(&self, page_number: u32, cursor: ScanCursor, limit: u32) -> PageScan {
        let start = ScanCursor {
            page_number,
            ..cursor
        };
        let path = self.site.listing_path_for(page_number);

        let html = match self.fetcher.get(&path).await {
            Ok(html) => html,
            Err(e) if e.is_not_found() => {
                log::info!("Page {} not found, end of listing", page_number);
                return PageScan {
                    items_processed: 0,
                    cursor: start,
                    status: PageStatus::EndOfListing,
                };
            }
            Err(e) => {
                log::warn!("Page {} fetch failed: {}", page_number, e);
                return PageScan {
                    items_processed: 0,
                    cursor: start,
                    status: PageStatus::Failed(e.to_string()),
                };
            }
        };

        let listing = self.listing.parse(&html);
        if listing.is_empty() {
            log::info!("Page {} has no items, end of listing", page_number);
            return PageScan {
                items_processed: 0,
                cursor: start,
                status: PageStatus::EndOfListing,
            };
        }
        log::info!(
            "Page {}: {} items ({} usable)",
            page_number,
            listing.item_count,
            listing.entries.len()
        );

        let mut progress = PageScan {
            items_processed: 0,
            cursor: start,
            status: PageStatus::Scanned,
        };
        if let Err(e) = self.scan_entries(&listing.entries, limit, &mut progress).await {
            log::error!("Page {} aborted by store error: {}", page_number, e);
            return PageScan {
                items_processed: progress.items_processed,
                cursor: start,
                status: PageStatus::Failed(e.to_string()),
            };
        }
        progress
    }

    async fn scan_entries(
        &self,
        entries: &[ListingEntry],
        limit: u32,
        progress: &mut PageScan,
    ) -> Result<()> {
        for (index, entry) in entries.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.item_delay).await;
            }

            let record = match self.extractor.extract(&entry.link, &entry.title).await {
                Extraction::Extracted(record) => record,
                Extraction::Skipped(reason) => {
                    log::debug!("'{}' skipped: {}", entry.title, reason);
                    continue;
                }
            };

            let stored = self.store.get(&record.identifier).await?;
            if needs_upsert(stored.as_ref(), &record) {
                log::info!(
                    "Updated '{}' (sub {}, dub {})",
                    record.title,
                    record.sub_count,
                    record.dub_count
                );
                self.store.upsert(&record).await?;
                progress.items_processed += 1;
                progress.cursor.consecutive_unchanged = 0;
            } else {
                progress.cursor.consecutive_unchanged += 1;
                log::debug!(
                    "Unchanged '{}' ({}/{})",
                    record.title,
                    progress.cursor.consecutive_unchanged,
                    limit
                );
                if progress.cursor.consecutive_unchanged >= limit {
                    log::info!(
                        "{} unchanged items in a row, stopping at page {}",
                        limit,
                        progress.cursor.page_number
                    );
                    progress.status = PageStatus::LimitReached;
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{ChangeEvent, CrawlerConfig, ItemRecord, ScanConfig};
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Listing page with one item per `(slug, title)` pair.
    pub(crate) fn listing_html(items: &[(&str, &str)]) -> String {
        let articles: String = items
            .iter()
            .map(|(slug, title)| {
                format!(
                    r#"<article class="story"><h2>{title}</h2>
                    <div class="story_c"><a href="/anime/{slug}.html">Дивитись</a></div></article>"#
                )
            })
            .collect();
        format!(r#"<html><body><div id="dle-content">{articles}</div></body></html>"#)
    }

    /// Detail page without playlist tokens; its episode label sets the dub count.
    pub(crate) fn detail_html(episodes: u32) -> String {
        format!(
            r#"<html><body><article class="story">
            <ul class="story_info"><li>Кількість серій: {episodes}</li></ul>
            </article></body></html>"#
        )
    }

    pub(crate) fn test_config(server: &MockServer) -> Config {
        Config {
            crawler: CrawlerConfig {
                base_url: server.uri(),
                timeout_secs: 5,
                rate_limit_backoff_ms: 5,
                network_backoff_ms: 5,
                ..CrawlerConfig::default()
            },
            scan: ScanConfig {
                item_delay_ms: 1,
                page_delay_ms: 1,
                ..ScanConfig::default()
            },
            ..Config::default()
        }
    }

    /// Record as the extractor will produce it for `detail_html(episodes)`.
    pub(crate) fn stored_record(server: &MockServer, slug: &str, episodes: u32) -> ItemRecord {
        ItemRecord {
            dub_count: episodes,
            ..ItemRecord::new(format!("{}/anime/{slug}.html", server.uri()), slug)
        }
    }

    pub(crate) async fn mount_page(server: &MockServer, page: u32, html: String) {
        Mock::given(method("GET"))
            .and(path(format!("/anime/page/{page}/")))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .mount(server)
            .await;
    }

    pub(crate) async fn mount_detail(server: &MockServer, slug: &str, episodes: u32) {
        Mock::given(method("GET"))
            .and(path(format!("/anime/{slug}.html")))
            .respond_with(ResponseTemplate::new(200).set_body_string(detail_html(episodes)))
            .mount(server)
            .await;
    }

    async fn detail_requests(server: &MockServer) -> usize {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path().ends_with(".html"))
            .count()
    }

    fn scanner(server: &MockServer, store: Arc<dyn RecordStore>) -> PageScanner {
        let config = test_config(server);
        let fetcher = Arc::new(Fetcher::new(&config.crawler).unwrap());
        PageScanner::new(&config, fetcher, store).unwrap()
    }

    #[tokio::test]
    async fn test_stops_right_after_limit() {
        let server = MockServer::start().await;
        let slugs = ["1-a", "2-b", "3-c", "4-d", "5-e"];
        let items: Vec<_> = slugs.iter().map(|s| (*s, *s)).collect();
        mount_page(&server, 1, listing_html(&items)).await;
        for slug in slugs {
            mount_detail(&server, slug, 6).await;
        }
        let store = Arc::new(MemoryStorage::with_records(
            slugs.iter().map(|s| stored_record(&server, s, 6)),
        ));

        let page = scanner(&server, store).scan(1, ScanCursor::start(), 3).await;

        assert_eq!(page.status, PageStatus::LimitReached);
        assert!(page.should_stop());
        assert_eq!(page.items_processed, 0);
        assert_eq!(page.cursor.consecutive_unchanged, 3);
        assert_eq!(detail_requests(&server).await, 3);
    }

    #[tokio::test]
    async fn test_new_item_then_unchanged_with_limit_one() {
        let server = MockServer::start().await;
        mount_page(&server, 1, listing_html(&[("1-new", "New"), ("2-old", "Old")])).await;
        mount_detail(&server, "1-new", 3).await;
        mount_detail(&server, "2-old", 12).await;
        let store = Arc::new(MemoryStorage::with_records([stored_record(&server, "2-old", 12)]));

        let page = scanner(&server, store.clone())
            .scan(1, ScanCursor::start(), 1)
            .await;

        assert_eq!(page.items_processed, 1);
        assert_eq!(page.status, PageStatus::LimitReached);
        assert_eq!(store.record_count().await.unwrap(), 2);

        let events = store.pending_events().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "New");
    }

    #[tokio::test]
    async fn test_counter_carries_over_from_previous_page() {
        let server = MockServer::start().await;
        mount_page(&server, 2, listing_html(&[("1-a", "A"), ("2-b", "B")])).await;
        mount_detail(&server, "1-a", 1).await;
        mount_detail(&server, "2-b", 1).await;
        let store = Arc::new(MemoryStorage::with_records([
            stored_record(&server, "1-a", 1),
            stored_record(&server, "2-b", 1),
        ]));
        let cursor = ScanCursor {
            page_number: 1,
            consecutive_unchanged: 2,
        };

        let page = scanner(&server, store).scan(2, cursor, 3).await;

        assert_eq!(page.status, PageStatus::LimitReached);
        assert_eq!(page.cursor.page_number, 2);
        assert_eq!(detail_requests(&server).await, 1);
    }

    #[tokio::test]
    async fn test_change_resets_counter() {
        let server = MockServer::start().await;
        mount_page(&server, 1, listing_html(&[("1-a", "A"), ("2-b", "B")])).await;
        mount_detail(&server, "1-a", 1).await;
        mount_detail(&server, "2-b", 5).await;
        let store = Arc::new(MemoryStorage::with_records([
            stored_record(&server, "1-a", 1),
            stored_record(&server, "2-b", 4),
        ]));

        let page = scanner(&server, store).scan(1, ScanCursor::start(), 30).await;

        assert_eq!(page.status, PageStatus::Scanned);
        assert!(!page.should_stop());
        assert_eq!(page.items_processed, 1);
        assert_eq!(page.cursor.consecutive_unchanged, 0);
    }

    #[tokio::test]
    async fn test_empty_listing_ends() {
        let server = MockServer::start().await;
        mount_page(&server, 4, "<html><body></body></html>".to_string()).await;

        let page = scanner(&server, Arc::new(MemoryStorage::new()))
            .scan(4, ScanCursor::start(), 30)
            .await;

        assert_eq!(page.status, PageStatus::EndOfListing);
        assert_eq!(page.items_processed, 0);
    }

    #[tokio::test]
    async fn test_missing_page_ends_and_keeps_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let cursor = ScanCursor {
            page_number: 7,
            consecutive_unchanged: 5,
        };

        let page = scanner(&server, Arc::new(MemoryStorage::new()))
            .scan(8, cursor, 30)
            .await;

        assert_eq!(page.status, PageStatus::EndOfListing);
        assert_eq!(page.cursor.consecutive_unchanged, 5);
    }

    #[tokio::test]
    async fn test_server_error_is_failure_not_stop() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let page = scanner(&server, Arc::new(MemoryStorage::new()))
            .scan(1, ScanCursor::start(), 30)
            .await;

        assert!(matches!(page.status, PageStatus::Failed(ref msg) if msg.contains("503")));
        assert!(!page.should_stop());
    }

    #[tokio::test]
    async fn test_skipped_items_leave_counters_alone() {
        let server = MockServer::start().await;
        mount_page(&server, 1, listing_html(&[("1-a", "A"), ("2-gone", "Gone"), ("3-c", "C")])).await;
        mount_detail(&server, "1-a", 2).await;
        mount_detail(&server, "3-c", 2).await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/anime/2-gone\.html$"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let store = Arc::new(MemoryStorage::with_records([
            stored_record(&server, "1-a", 2),
            stored_record(&server, "3-c", 2),
        ]));

        let page = scanner(&server, store).scan(1, ScanCursor::start(), 30).await;

        assert_eq!(page.status, PageStatus::Scanned);
        assert_eq!(page.items_processed, 0);
        assert_eq!(page.cursor.consecutive_unchanged, 2);
    }

    struct BrokenStore;

    #[async_trait]
    impl RecordStore for BrokenStore {
        async fn get(&self, _identifier: &str) -> Result<Option<ItemRecord>> {
            Err(AppError::store("disk full"))
        }

        async fn upsert(&self, _record: &ItemRecord) -> Result<Option<ChangeEvent>> {
            Err(AppError::store("disk full"))
        }

        async fn pending_events(&self) -> Result<Vec<ChangeEvent>> {
            Ok(Vec::new())
        }

        async fn mark_processed(&self, _ids: &[String]) -> Result<usize> {
            Ok(0)
        }

        async fn record_count(&self) -> Result<usize> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_store_error_fails_page() {
        let server = MockServer::start().await;
        mount_page(&server, 1, listing_html(&[("1-a", "A")])).await;
        mount_detail(&server, "1-a", 2).await;

        let page = scanner(&server, Arc::new(BrokenStore))
            .scan(1, ScanCursor::start(), 30)
            .await;

        assert!(matches!(page.status, PageStatus::Failed(ref msg) if msg.contains("disk full")));
        assert_eq!(page.cursor, ScanCursor::start());
    }
}
