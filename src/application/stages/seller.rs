//! Seller stage
//!
//! Enriches every accepted seller with the registration facts from its
//! profile page and classifies the result. A seller that cannot be fetched
//! is logged and skipped; the rest of the set still completes.

use std::time::Duration;

use scraper::Html;
use tracing::{info, warn};

use crate::application::context::AppContext;
use crate::domain::classify::{classify_completeness, classify_tax_id};
use crate::domain::entities::{DiscoveredSeller, SellerDetail};
use crate::domain::error::CrawlError;
use crate::infrastructure::parsing::{SellerPageParser, SellerProfilePage};

pub struct SellerStage {
    parser: SellerPageParser,
}

impl SellerStage {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            parser: SellerPageParser::new()?,
        })
    }

    /// Fetch and classify the profile of every discovered seller.
    pub async fn run(
        &self,
        ctx: &AppContext,
        discovered: Vec<DiscoveredSeller>,
    ) -> Vec<SellerDetail> {
        info!("3. Fetching {} seller profiles", discovered.len());

        let mut details = Vec::with_capacity(discovered.len());
        for seller in discovered {
            let profile_url = format!(
                "https://{}/sp?ie=UTF8&seller={}",
                ctx.domain(),
                seller.seller_id
            );

            if let Err(err) = ctx.gate.check(ctx.user_agent(), &profile_url) {
                warn!("Skipping seller {}: {err}", seller.seller_id);
                continue;
            }

            info!("Fetching seller profile id={} url={}", seller.seller_id, profile_url);
            match self.visit(ctx, &profile_url).await {
                Ok(profile) => {
                    let detail = build_detail(seller, profile);
                    info!(
                        "Seller profile parsed id={} business={} tax_id={}",
                        detail.seller_id, detail.business_name, detail.tax_id
                    );
                    details.push(detail);
                }
                Err(err) => {
                    warn!("Seller {} failed: {err}", seller.seller_id);
                }
            }
        }

        info!("3. Seller stage enriched {} profiles", details.len());
        details
    }

    /// Fetch and parse one seller profile page under the shared retry
    /// vocabulary.
    async fn visit(&self, ctx: &AppContext, url: &str) -> Result<SellerProfilePage, CrawlError> {
        let mut cooldown_used = false;
        let mut recovery_used = false;
        loop {
            let parsed = match ctx.fetcher.fetch(url).await {
                Ok(body) => {
                    let html = Html::parse_document(&body);
                    self.parser.parse(&html)
                }
                Err(err) => Err(err),
            };

            match parsed {
                Ok(profile) => return Ok(profile),
                Err(err) if err.wants_cooldown_retry() && !cooldown_used => {
                    cooldown_used = true;
                    warn!("Seller fetch hit {err}, cooling down before one retry");
                    tokio::time::sleep(Duration::from_millis(ctx.config.crawler.entity_cooldown_ms))
                        .await;
                }
                Err(err) if err.wants_cookie_recovery() && !recovery_used => {
                    recovery_used = true;
                    warn!("Seller fetch hit a verification page, rotating cookie");
                    if let Err(recovery_err) = ctx.cookies.handle_invalid_response().await {
                        warn!("Cookie recovery failed: {recovery_err}");
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn build_detail(seller: DiscoveredSeller, profile: SellerProfilePage) -> SellerDetail {
    let tax_id_status = classify_tax_id(&profile.tax_id);
    let completeness =
        classify_completeness(&profile.business_name, &profile.address, &profile.tax_id);
    SellerDetail {
        seller_id: seller.seller_id,
        seller_name: seller.seller_name,
        keyword: seller.keyword,
        business_name: profile.business_name,
        address: profile.address,
        tax_id: profile.tax_id,
        tax_id_status,
        completeness,
        feedback: profile.feedback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::classify::{CompletenessStatus, TaxIdStatus};
    use crate::domain::entities::FeedbackCounts;

    #[test]
    fn detail_classification_uses_the_parsed_fields() {
        let seller = DiscoveredSeller {
            seller_id: "A1B2".to_string(),
            seller_name: "Acme Storefront".to_string(),
            keyword: "acme tools".to_string(),
        };
        let profile = SellerProfilePage {
            business_name: "Acme Ltd".to_string(),
            address: String::new(),
            tax_id: "911234567890123456".to_string(),
            feedback: FeedbackCounts::default(),
        };

        let detail = build_detail(seller, profile);
        assert_eq!(detail.tax_id_status, TaxIdStatus::DomesticTaxId);
        assert_eq!(detail.completeness, CompletenessStatus::NoAddress);
        assert_eq!(detail.keyword, "acme tools");
    }
}
