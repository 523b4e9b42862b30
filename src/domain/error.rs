//! Crawl error taxonomy
//!
//! A closed vocabulary shared by every stage so retry policy can be decided
//! by matching instead of string inspection.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum CrawlError {
    #[error("page not found (404)")]
    NotFound,

    #[error("service unavailable (503)")]
    ServiceUnavailable,

    #[error("verification page served, session cookie rejected")]
    VerificationRequired,

    #[error("product page has no seller profile link")]
    NoSellerLink,

    #[error("fetch disallowed by robots rules: {url}")]
    ComplianceDisallowed { url: String },

    #[error("no unbound active cookie available in the pool")]
    NoCookieAvailable,

    #[error("unexpected status code {0}")]
    UnexpectedStatus(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("database error: {0}")]
    Database(String),
}

impl CrawlError {
    /// Errors that warrant a fixed cooldown followed by a single retry of
    /// the same operation.
    pub fn wants_cooldown_retry(&self) -> bool {
        matches!(self, CrawlError::NotFound | CrawlError::ServiceUnavailable)
    }

    /// Errors that route through cookie recovery before any retry.
    pub fn wants_cookie_recovery(&self) -> bool {
        matches!(self, CrawlError::VerificationRequired)
    }
}

impl From<sqlx::Error> for CrawlError {
    fn from(err: sqlx::Error) -> Self {
        CrawlError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for CrawlError {
    fn from(err: reqwest::Error) -> Self {
        CrawlError::Transport(err.to_string())
    }
}

pub type CrawlResult<T> = Result<T, CrawlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_vocabulary_is_limited_to_transient_statuses() {
        assert!(CrawlError::NotFound.wants_cooldown_retry());
        assert!(CrawlError::ServiceUnavailable.wants_cooldown_retry());
        assert!(!CrawlError::VerificationRequired.wants_cooldown_retry());
        assert!(!CrawlError::NoSellerLink.wants_cooldown_retry());
        assert!(CrawlError::VerificationRequired.wants_cookie_recovery());
    }
}
