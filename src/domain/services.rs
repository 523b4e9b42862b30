//! Domain service traits
//!
//! Seams between the pipeline and the outside world. The live
//! implementations sit in the infrastructure layer; tests substitute stubs.

use async_trait::async_trait;

use crate::domain::error::CrawlResult;

/// Fetches one page of HTML.
///
/// Implementations own transport concerns (headers, timeouts, rate
/// limiting, session cookie injection) and map HTTP statuses onto the crawl
/// error vocabulary: 404 to `NotFound`, 503 to `ServiceUnavailable`,
/// anything else non-200 to `UnexpectedStatus`.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> CrawlResult<String>;
}

/// Permission check consulted before every outbound fetch.
///
/// A denial aborts that specific fetch without retry.
pub trait ComplianceGate: Send + Sync {
    fn check(&self, user_agent: &str, url: &str) -> CrawlResult<()>;
}

/// Gate that allows everything. Used when robots rules are unavailable and
/// in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllGate;

impl ComplianceGate for AllowAllGate {
    fn check(&self, _user_agent: &str, _url: &str) -> CrawlResult<()> {
        Ok(())
    }
}
