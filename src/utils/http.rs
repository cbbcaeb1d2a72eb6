// src/utils/http.rs

//! HTTP client construction.

use std::time::Duration;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};

use crate::error::Result;
use crate::models::CrawlerConfig;

/// Headers a desktop browser sends along with its User-Agent.
fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("uk-UA,uk;q=0.9,en;q=0.8"));
    headers
}

/// Create the shared asynchronous client for the source site.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .default_headers(browser_headers())
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_client_identifies_as_browser() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let config = CrawlerConfig::default();
        let client = create_async_client(&config).unwrap();
        client.get(server.uri()).send().await.unwrap();

        // Compare raw values: both headers contain commas.
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let raw = |name: &str| {
            requests[0]
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        assert_eq!(raw("user-agent"), Some(config.user_agent.clone()));
        assert_eq!(raw("accept-language"), Some("uk-UA,uk;q=0.9,en;q=0.8".to_string()));
    }
}
