//! HTTP client for web crawling with rate limiting and error handling
//!
//! Wraps `reqwest` with the request pacing and header profile the
//! marketplace expects, injects the current pool cookie, and maps response
//! statuses onto the shared crawl error vocabulary.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{direct::NotKeyed, InMemoryState},
    Quota, RateLimiter,
};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, USER_AGENT},
    Client,
};

use crate::domain::error::{CrawlError, CrawlResult};
use crate::domain::services::PageFetcher;
use crate::infrastructure::config::CrawlerConfig;
use crate::infrastructure::cookie_pool::CookiePool;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,\
    image/avif,image/webp,image/apng,*/*;q=0.8";

/// Rate limited HTTP client bound to the marketplace host.
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: CrawlerConfig,
    cookies: Option<Arc<CookiePool>>,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration.
    pub fn new(config: CrawlerConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("Rate limit must be greater than 0")?,
        );
        let rate_limiter = RateLimiter::direct(quota);

        Ok(Self {
            client,
            rate_limiter,
            config,
            cookies: None,
        })
    }

    /// Attach the cookie pool whose current binding is sent with every
    /// request.
    pub fn with_cookie_pool(mut self, cookies: Arc<CookiePool>) -> Self {
        self.cookies = Some(cookies);
        self
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Fetch a URL without error-vocabulary mapping. Used for auxiliary
    /// documents such as robots.txt.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch URL: {url}"))?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP request failed with status {}: {}", response.status(), url);
        }

        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from: {url}"))?;
        Ok(text)
    }

    /// Current session cookie header value, if the pool can provide one.
    ///
    /// Cookie exhaustion degrades to an anonymous request instead of
    /// failing the fetch.
    async fn cookie_header(&self) -> Option<String> {
        let pool = self.cookies.as_ref()?;
        match pool.acquire().await {
            Ok(cookie) => Some(cookie.value),
            Err(CrawlError::NoCookieAvailable) => {
                tracing::warn!("Cookie pool exhausted, fetching without a session cookie");
                None
            }
            Err(err) => {
                tracing::warn!("Cookie acquisition failed: {err}, fetching anonymously");
                None
            }
        }
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch(&self, url: &str) -> CrawlResult<String> {
        self.rate_limiter.until_ready().await;

        tracing::debug!("Fetching URL: {}", url);

        let mut request = self.client.get(url);
        if let Some(cookie) = self.cookie_header().await {
            match HeaderValue::from_str(&cookie) {
                Ok(value) => request = request.header(COOKIE, value),
                Err(_) => tracing::warn!("Pool cookie contains invalid header bytes, skipped"),
            }
        }

        let response = request.send().await?;

        match response.status().as_u16() {
            200 => {}
            404 => return Err(CrawlError::NotFound),
            503 => return Err(CrawlError::ServiceUnavailable),
            status => return Err(CrawlError::UnexpectedStatus(status)),
        }

        let text = response.text().await?;
        tracing::debug!("Successfully fetched: {} ({} chars)", url, text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_client_creation() {
        let config = CrawlerConfig::default();
        let client = HttpClient::new(config);
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_zero_rate_limit_is_rejected() {
        let config = CrawlerConfig {
            max_requests_per_second: 0,
            ..Default::default()
        };
        assert!(HttpClient::new(config).is_err());
    }
}
