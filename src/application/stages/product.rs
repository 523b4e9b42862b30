//! Product stage
//!
//! Visits candidate products, extracts seller and brand facts, and
//! accumulates the deduplicated seller set. Two entry points feed the same
//! per-product logic: the memory-passing pipeline hands over the candidate
//! list from the search stage, and the batch recheck path reloads stored
//! rows in `Checking` status. Failures here are entity-scoped: a bad
//! product page affects only that product's status, never the task.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use scraper::Html;
use tracing::{info, warn};

use crate::application::context::AppContext;
use crate::domain::entities::{DiscoveredSeller, ProductRecord, ProductStatus};
use crate::domain::error::CrawlError;
use crate::infrastructure::parsing::{ProductPage, ProductPageParser};
use crate::infrastructure::product_repository::ProductRepository;

/// Seller set accumulated across one product stage run.
///
/// Dedup key is `seller_id`; first-seen order and first-seen names win,
/// later duplicates may only fill a previously empty name.
struct SellerAccumulator {
    keyword: String,
    keyword_lower: String,
    sellers: Vec<DiscoveredSeller>,
    by_seller_id: HashMap<String, usize>,
}

impl SellerAccumulator {
    fn new(keyword: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            keyword_lower: keyword.to_lowercase(),
            sellers: Vec::new(),
            by_seller_id: HashMap::new(),
        }
    }

    /// Acceptance gate: the discovered brand must equal the task keyword
    /// case-insensitively and a seller id must be present.
    fn admit(&mut self, page: &ProductPage) {
        if page.brand_name != self.keyword_lower {
            return;
        }
        let Some(seller_id) = page.seller_id.clone() else {
            return;
        };

        match self.by_seller_id.get(&seller_id) {
            Some(&idx) => {
                let existing = &mut self.sellers[idx];
                if existing.seller_name.is_empty() && !page.seller_name.is_empty() {
                    existing.seller_name = page.seller_name.clone();
                }
            }
            None => {
                info!("Discovered seller id={} name={}", seller_id, page.seller_name);
                self.by_seller_id.insert(seller_id.clone(), self.sellers.len());
                self.sellers.push(DiscoveredSeller {
                    seller_id,
                    seller_name: page.seller_name.clone(),
                    keyword: self.keyword.clone(),
                });
            }
        }
    }
}

pub struct ProductStage {
    parser: ProductPageParser,
}

impl ProductStage {
    pub fn new() -> Result<Self> {
        Ok(Self {
            parser: ProductPageParser::new()?,
        })
    }

    /// Memory-passing entry point: visit all candidates from the search
    /// stage, stamping each record's terminal status, and return the
    /// accepted sellers in first-seen order.
    pub async fn run(
        &self,
        ctx: &AppContext,
        products: &mut [ProductRecord],
        keyword: &str,
    ) -> Vec<DiscoveredSeller> {
        info!("2. Visiting {} products for '{}'", products.len(), keyword);

        let mut accumulator = SellerAccumulator::new(keyword);
        for product in products.iter_mut() {
            self.process_product(ctx, product, &mut accumulator).await;
        }

        info!(
            "2. Product stage found {} distinct sellers",
            accumulator.sellers.len()
        );
        accumulator.sellers
    }

    /// Batch recheck entry point: claim stored rows of one keyword into
    /// `Checking`, run the identical per-product logic, and write each
    /// outcome back row by row.
    pub async fn recheck_stored(
        &self,
        ctx: &AppContext,
        repo: &ProductRepository,
        keyword: &str,
    ) -> Result<Vec<DiscoveredSeller>> {
        let claimed = repo.claim_for_check(keyword, ctx.app_id(), 1000).await?;
        info!("2. Rechecking {} stored products for '{}'", claimed, keyword);

        let mut accumulator = SellerAccumulator::new(keyword);
        for mut stored in repo.fetch_checking(keyword, ctx.app_id()).await? {
            // Absolute URLs were stored by older runs; only path-shaped
            // rows can be rebuilt against the configured domain.
            if stored.record.url.starts_with("http") {
                continue;
            }
            self.process_product(ctx, &mut stored.record, &mut accumulator).await;
            if let Err(err) = repo.update_outcome(stored.id, ctx.app_id(), &stored.record).await {
                warn!("Failed to store recheck outcome for row {}: {err}", stored.id);
            }
        }

        info!(
            "2. Recheck found {} distinct sellers",
            accumulator.sellers.len()
        );
        Ok(accumulator.sellers)
    }

    /// Shared per-product logic: fetch, classify the outcome onto the
    /// record's status field, and offer the page to the seller gate.
    async fn process_product(
        &self,
        ctx: &AppContext,
        product: &mut ProductRecord,
        accumulator: &mut SellerAccumulator,
    ) {
        product.status = ProductStatus::Checking;
        let product_url = format!("https://{}{}{}", ctx.domain(), product.url, product.param);

        if let Err(err) = ctx.gate.check(ctx.user_agent(), &product_url) {
            warn!("Skipping product {}: {err}", product.asin);
            product.status = ProductStatus::ErrorExhausted;
            return;
        }

        info!("Visiting product asin={} url={}", product.asin, product_url);
        match self.visit(ctx, &product_url).await {
            Ok(page) => {
                if page.seller_id.is_none() && page.brand_name.is_empty() {
                    product.status = ProductStatus::NoSellerFound;
                    return;
                }

                product.status = ProductStatus::Done;
                product.seller_id = page.seller_id.clone();
                product.brand_name = (!page.brand_name.is_empty()).then(|| page.brand_name.clone());
                product.brand_store_url = page.brand_store_url.clone();

                accumulator.admit(&page);
            }
            Err(CrawlError::NoSellerLink) => {
                info!("Product {} has no seller link", product.asin);
                product.status = ProductStatus::NoSellerFound;
            }
            Err(err) => {
                warn!("Product {} failed: {err}", product.asin);
                product.status = ProductStatus::ErrorExhausted;
            }
        }
    }

    /// Fetch and parse one product page under the shared retry vocabulary:
    /// one cooldown retry for 404/503, one cookie-recovery retry for a
    /// verification page.
    async fn visit(&self, ctx: &AppContext, url: &str) -> Result<ProductPage, CrawlError> {
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
                Ok(page) => return Ok(page),
                Err(err) if err.wants_cooldown_retry() && !cooldown_used => {
                    cooldown_used = true;
                    warn!("Product fetch hit {err}, cooling down before one retry");
                    tokio::time::sleep(Duration::from_millis(ctx.config.crawler.entity_cooldown_ms))
                        .await;
                }
                Err(err) if err.wants_cookie_recovery() && !recovery_used => {
                    recovery_used = true;
                    warn!("Product fetch hit a verification page, rotating cookie");
                    if let Err(recovery_err) = ctx.cookies.handle_invalid_response().await {
                        warn!("Cookie recovery failed: {recovery_err}");
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}
