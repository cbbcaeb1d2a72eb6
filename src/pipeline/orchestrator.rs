// src/pipeline/orchestrator.rs

//! Scan orchestration.
//!
//! A run walks the listing from page 1 and stops at the first of:
//! end of listing, the unchanged limit, a page with nothing actionable, the
//! page cap, or a page that keeps failing. Runs never overlap; a second
//! caller gets [`AppError::ScanInProgress`].

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{Config, ScanConfig, ScanCursor};
use crate::pipeline::scan::{PageScanner, PageStatus};
use crate::services::Fetcher;
use crate::storage::RecordStore;
use crate::utils::log as report;

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndOfListing,
    LimitReached,
    /// A scanned page wrote nothing and held no unchanged items
    NothingActionable,
    MaxPages,
    /// A page failed more times than the retry budget allows
    PageFailures { page: u32 },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::EndOfListing => write!(f, "end of listing"),
            StopReason::LimitReached => write!(f, "unchanged limit reached"),
            StopReason::NothingActionable => write!(f, "nothing actionable"),
            StopReason::MaxPages => write!(f, "page cap reached"),
            StopReason::PageFailures { page } => write!(f, "page {page} kept failing"),
        }
    }
}

/// Outcome of one orchestrator run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Pages fetched and walked, including the one the run stopped on
    pub pages_scanned: u32,
    pub items_processed: u32,
    /// Failed page attempts, retried or not
    pub page_failures: u32,
    pub stop_reason: StopReason,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// Log the run as a summary block.
    pub fn log(&self) {
        let elapsed = self.finished_at - self.started_at;
        report::summary(
            "Scan",
            &[
                ("pages", self.pages_scanned.to_string()),
                ("items updated", self.items_processed.to_string()),
                ("page failures", self.page_failures.to_string()),
                ("stopped", self.stop_reason.to_string()),
                ("duration", format!("{}s", elapsed.num_seconds())),
            ],
        );
    }
}

/// Drives page scans until a stop condition fires.
///
/// Cheap to clone; clones share the scanner and the run lock.
#[derive(Clone)]
pub struct ScanOrchestrator {
    scanner: Arc<PageScanner>,
    scan: ScanConfig,
    run_lock: Arc<Mutex<()>>,
}

impl ScanOrchestrator {
    /// Build the fetcher and scanner for `config` on top of `store`.
    pub fn new(config: &Config, store: Arc<dyn RecordStore>) -> Result<Self> {
        let fetcher = Arc::new(Fetcher::new(&config.crawler)?);
        let scanner = PageScanner::new(config, fetcher, store)?;
        Ok(Self::with_scanner(scanner, config.scan.clone()))
    }

    pub fn with_scanner(scanner: PageScanner, scan: ScanConfig) -> Self {
        Self {
            scanner: Arc::new(scanner),
            scan,
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Run one scan from the first page.
    pub async fn run(&self) -> Result<RunSummary> {
        let _guard = Arc::clone(&self.run_lock)
            .try_lock_owned()
            .map_err(|_| AppError::ScanInProgress)?;

        let started_at = Utc::now();
        report::header("Catalogue scan");

        let limit = self.scan.unchanged_limit;
        let mut cursor = ScanCursor::start();
        let mut pages_scanned = 0;
        let mut items_processed = 0;
        let mut page_failures = 0;
        let mut attempts_failed = 0;

        let stop_reason = loop {
            if self
                .scan
                .max_pages
                .is_some_and(|max| cursor.page_number > max)
            {
                break StopReason::MaxPages;
            }

            let page = self.scanner.scan(cursor.page_number, cursor, limit).await;
            items_processed += page.items_processed;

            if let PageStatus::Failed(reason) = &page.status {
                page_failures += 1;
                attempts_failed += 1;
                if attempts_failed > self.scan.max_page_retries {
                    log::error!(
                        "Page {} failed {} times, giving up: {}",
                        cursor.page_number,
                        attempts_failed,
                        reason
                    );
                    break StopReason::PageFailures {
                        page: cursor.page_number,
                    };
                }
                log::warn!(
                    "Retrying page {} ({}/{})",
                    cursor.page_number,
                    attempts_failed,
                    self.scan.max_page_retries
                );
                tokio::time::sleep(self.scan.page_delay()).await;
                continue;
            }
            attempts_failed = 0;
            cursor = page.cursor;

            match page.status {
                PageStatus::EndOfListing => break StopReason::EndOfListing,
                PageStatus::LimitReached => {
                    pages_scanned += 1;
                    break StopReason::LimitReached;
                }
                _ => pages_scanned += 1,
            }

            if page.items_processed == 0 && cursor.consecutive_unchanged == 0 {
                log::info!("Page {} had nothing actionable", cursor.page_number);
                break StopReason::NothingActionable;
            }

            cursor.page_number += 1;
            tokio::time::sleep(self.scan.page_delay()).await;
        };

        let summary = RunSummary {
            pages_scanned,
            items_processed,
            page_failures,
            stop_reason,
            started_at,
            finished_at: Utc::now(),
        };
        summary.log();
        Ok(summary)
    }

    /// Start a run every `scan.interval_secs`, forever.
    ///
    /// Each tick runs on its own task; a tick that lands while the previous
    /// run is still going is dropped.
    pub async fn watch(&self) {
        let mut ticker = tokio::time::interval(self.scan.interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let orchestrator = self.clone();
            tokio::spawn(async move {
                match orchestrator.run().await {
                    Ok(_) => {}
                    Err(AppError::ScanInProgress) => {
                        log::warn!("Previous scan still running, skipping this tick")
                    }
                    Err(e) => log::error!("Scan failed: {}", e),
                }
            });
        }
    }
}
