// src/services/fetcher.rs

//! HTTP fetcher with fixed-interval retries.
//!
//! Rate-limit responses (429) and transport failures share one retry budget
//! but wait for different, fixed intervals. Every other non-success status
//! fails on the spot.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;
use crate::utils::http::create_async_client;

/// Fetches pages from the source site.
pub struct Fetcher {
    client: Client,
    base_url: Url,
    max_retries: u32,
    rate_limit_backoff: Duration,
    network_backoff: Duration,
}

impl Fetcher {
    /// Create a fetcher from crawler settings.
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        Ok(Self {
            client: create_async_client(config)?,
            base_url,
            max_retries: config.max_retries,
            rate_limit_backoff: config.rate_limit_backoff(),
            network_backoff: config.network_backoff(),
        })
    }

    /// Origin relative paths are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Default retry budget.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Resolve a relative or absolute URL against the base origin.
    pub fn resolve(&self, url: &str) -> Result<Url> {
        Ok(self.base_url.join(url)?)
    }

    /// Fetch a URL with the default retry budget and no extra headers.
    pub async fn get(&self, url: &str) -> Result<String> {
        self.fetch(url, &HeaderMap::new(), self.max_retries).await
    }

    /// Fetch a URL and return its body as text.
    ///
    /// `retries` is the number of additional attempts allowed after the
    /// first one. Once it is spent, the last network error or the last
    /// response status is returned.
    pub async fn fetch(&self, url: &str, extra_headers: &HeaderMap, retries: u32) -> Result<String> {
        let target = self.resolve(url)?;
        let mut retries_remaining = retries;

        loop {
            let response = match self
                .client
                .get(target.clone())
                .headers(extra_headers.clone())
                .send()
                .await
            {
                Ok(response) => response,
                Err(error) if retries_remaining > 0 => {
                    log::warn!(
                        "Network error for {} ({}), retrying in {:?} ({} left)",
                        target,
                        error,
                        self.network_backoff,
                        retries_remaining
                    );
                    tokio::time::sleep(self.network_backoff).await;
                    retries_remaining -= 1;
                    continue;
                }
                Err(error) => return Err(error.into()),
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS && retries_remaining > 0 {
                log::warn!(
                    "Rate limited on {}, retrying in {:?} ({} left)",
                    target,
                    self.rate_limit_backoff,
                    retries_remaining
                );
                tokio::time::sleep(self.rate_limit_backoff).await;
                retries_remaining -= 1;
                continue;
            }

            if !status.is_success() {
                return Err(AppError::fetch_failed(status));
            }

            match response.text().await {
                Ok(body) => return Ok(body),
                Err(error) if retries_remaining > 0 => {
                    log::warn!(
                        "Failed reading body of {} ({}), retrying in {:?} ({} left)",
                        target,
                        error,
                        self.network_backoff,
                        retries_remaining
                    );
                    tokio::time::sleep(self.network_backoff).await;
                    retries_remaining -= 1;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }
}
