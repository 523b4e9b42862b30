//! Search stage
//!
//! Fetches page 1 of the keyword search (deeper pagination is unreliable
//! against the marketplace anti-automation measures) and parses it into
//! the admitted candidate list. Records one SearchRun row per attempt,
//! closed exactly once with the admitted count.

use std::time::Duration;

use scraper::Html;
use tracing::{info, warn};

use crate::application::context::AppContext;
use crate::domain::entities::{KeywordTask, ProductRecord};
use crate::domain::error::{CrawlError, CrawlResult};
use crate::infrastructure::parsing::SearchResultParser;
use crate::infrastructure::run_repository::RunRepository;

pub struct SearchStage {
    parser: SearchResultParser,
}

impl SearchStage {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            parser: SearchResultParser::new()?,
        })
    }

    /// Run the search stage for one task. A failure here is stage-scoped:
    /// the caller marks the whole task Failed.
    pub async fn run(&self, ctx: &AppContext, task: &KeywordTask) -> CrawlResult<Vec<ProductRecord>> {
        let search_url = format!(
            "https://{}/s?k={}&page=1&dc",
            ctx.domain(),
            format_keyword(&task.keyword)
        );

        ctx.gate.check(ctx.user_agent(), &search_url)?;

        let runs = RunRepository::new(ctx.db.clone());
        let run_id = runs
            .open_search_run(task.id, ctx.app_id())
            .await
            .map_err(|e| CrawlError::Database(e.to_string()))?;

        info!("1. Searching keyword '{}' url={}", task.keyword, search_url);

        let mut cooldown_used = false;
        let mut recovery_used = false;
        let outcome = loop {
            let parsed = match ctx.fetcher.fetch(&search_url).await {
                Ok(body) => {
                    let html = Html::parse_document(&body);
                    self.parser.parse(&html, &task.keyword)
                }
                Err(err) => Err(err),
            };

            match parsed {
                Ok(products) => break Ok(products),
                Err(err) if err.wants_cooldown_retry() && !cooldown_used => {
                    cooldown_used = true;
                    warn!("Search fetch hit {err}, cooling down before one retry");
                    tokio::time::sleep(Duration::from_millis(ctx.config.crawler.search_cooldown_ms))
                        .await;
                }
                Err(err) if err.wants_cookie_recovery() && !recovery_used => {
                    recovery_used = true;
                    warn!("Search fetch hit a verification page, rotating cookie");
                    if let Err(recovery_err) = ctx.cookies.handle_invalid_response().await {
                        warn!("Cookie recovery failed: {recovery_err}");
                    }
                }
                Err(err) => break Err(err),
            }
        };

        let valid = outcome.as_ref().map(Vec::len).unwrap_or(0) as i64;
        if let Err(err) = runs.close_search_run(run_id, valid).await {
            warn!("Failed to close search run {run_id}: {err}");
        }

        match &outcome {
            Ok(products) => info!(
                "Search finished for '{}': {} candidates admitted",
                task.keyword,
                products.len()
            ),
            Err(err) => warn!("Search failed for '{}': {err}", task.keyword),
        }
        outcome
    }
}

/// Format a keyword for the search URL: spaces become `+`, apostrophes are
/// percent-escaped.
pub fn format_keyword(keyword: &str) -> String {
    keyword.replace(' ', "+").replace('\'', "%27")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_formatting_for_search_urls() {
        assert_eq!(format_keyword("acme tools"), "acme+tools");
        assert_eq!(format_keyword("o'brien hardware"), "o%27brien+hardware");
        assert_eq!(format_keyword("plain"), "plain");
    }
}
