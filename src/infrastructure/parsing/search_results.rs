//! Search result page parser
//!
//! Extracts candidate products from page 1 of a keyword search. Candidates
//! are deduplicated by ASIN in first-seen document order, and admission is
//! capped by the purchase-signal quota: tiles carrying a "bought in past
//! month" badge are always admitted, badge-less tiles only while fewer than
//! `MAX_ADMITTED` badged tiles exist and the overall total stays under the
//! same bound.

use std::collections::HashSet;

use anyhow::Result;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::domain::entities::{ProductRecord, ProductStatus};
use crate::domain::error::{CrawlError, CrawlResult};
use crate::infrastructure::parsing::{compile_selector, is_verification_page};

/// Quota bound for admitted candidates per search page.
const MAX_ADMITTED: usize = 10;

/// Parser for keyword search result pages.
pub struct SearchResultParser {
    results_container: Selector,
    result_tiles: Selector,
    tile_link: Selector,
    tile_title: Selector,
    secondary_spans: Selector,
    price_span: Selector,
    price_whole: Selector,
    price_fraction: Selector,
    rating_span: Selector,
    review_span: Selector,
}

impl SearchResultParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            results_container: compile_selector(r#"div[class~="s-search-results"]"#)?,
            result_tiles: compile_selector("div[data-index]")?,
            tile_link: compile_selector("a")?,
            tile_title: compile_selector("h2")?,
            secondary_spans: compile_selector("span.a-size-base.a-color-secondary")?,
            price_span: compile_selector(r#"span.a-price[data-a-size="xl"]"#)?,
            price_whole: compile_selector("span.a-price-whole")?,
            price_fraction: compile_selector("span.a-price-fraction")?,
            rating_span: compile_selector(r#"span.a-size-small.a-color-base[aria-hidden="true"]"#)?,
            review_span: compile_selector(
                r#"span.a-size-mini.puis-normal-weight-text.s-underline-text[aria-hidden="true"]"#,
            )?,
        })
    }

    /// Parse one search result page into admitted candidates.
    pub fn parse(&self, html: &Html, keyword: &str) -> CrawlResult<Vec<ProductRecord>> {
        if is_verification_page(html) {
            return Err(CrawlError::VerificationRequired);
        }

        let Some(container) = html.select(&self.results_container).next() else {
            return Err(CrawlError::Parse("unexpected search page structure".to_string()));
        };

        let tiles: Vec<ElementRef> = container.select(&self.result_tiles).collect();
        if tiles.is_empty() {
            return Err(CrawlError::Parse("no product tiles on search page".to_string()));
        }
        debug!("Found {} result tiles for '{}'", tiles.len(), keyword);

        let mut admitted: Vec<ProductRecord> = Vec::new();
        let mut seen_asins: HashSet<String> = HashSet::new();
        let mut with_signal = 0usize;
        let mut without_signal = 0usize;

        for tile in &tiles {
            let Some(link_el) = tile.select(&self.tile_link).next() else {
                continue;
            };
            let Some(raw_href) = link_el.value().attr("href") else {
                continue;
            };
            let link = urlencoding::decode(raw_href)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| raw_href.to_string());

            if link.starts_with("/gp/")
                || link.contains("javascript:void(0)")
                || link.starts_with("https://aax-")
            {
                continue;
            }

            let asin = extract_asin(&link);
            if asin.is_empty() || seen_asins.contains(&asin) {
                continue;
            }

            let title = tile
                .select(&self.tile_title)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .unwrap_or_default();

            // Quota bookkeeping happens before the link-shape check below,
            // so a tile that is later rejected still consumed its slot.
            let bought_count = self.extract_bought_count(tile);
            if bought_count.is_empty() {
                if with_signal >= MAX_ADMITTED {
                    continue;
                }
                if with_signal + without_signal >= MAX_ADMITTED {
                    continue;
                }
                without_signal += 1;
            } else {
                with_signal += 1;
            }

            let price = self.extract_price(tile);
            let rating = self
                .extract_first_text(tile, &self.rating_span)
                .unwrap_or_default();
            let review_count = self
                .extract_first_text(tile, &self.review_span)
                .map(|text| text.trim_matches(['(', ')']).to_string())
                .unwrap_or_default();

            let Some((url, param)) = split_ref_param(&link) else {
                warn!("Skipping link without ref parameter: {}", link);
                continue;
            };

            seen_asins.insert(asin.clone());
            admitted.push(ProductRecord {
                url,
                param,
                title,
                asin,
                keyword: keyword.to_string(),
                bought_count,
                price,
                rating,
                review_count,
                status: ProductStatus::Inserted,
                seller_id: None,
                brand_name: None,
                brand_store_url: None,
            });
        }

        Ok(admitted)
    }

    fn extract_bought_count(&self, tile: &ElementRef) -> String {
        for span in tile.select(&self.secondary_spans) {
            let text = span.text().collect::<String>().trim().to_string();
            if text.contains("bought in past month") {
                return text.split('+').next().unwrap_or("").trim().to_string();
            }
        }
        String::new()
    }

    fn extract_price(&self, tile: &ElementRef) -> String {
        let Some(price_el) = tile.select(&self.price_span).next() else {
            return String::new();
        };
        let whole = price_el
            .select(&self.price_whole)
            .next()
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default();
        if whole.is_empty() {
            return String::new();
        }
        let fraction = price_el
            .select(&self.price_fraction)
            .next()
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default();
        if fraction.is_empty() {
            whole
        } else {
            format!("{whole}.{fraction}")
        }
    }

    fn extract_first_text(&self, tile: &ElementRef, selector: &Selector) -> Option<String> {
        tile.select(selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
    }
}

/// Pull the bare ASIN out of a `/dp/` product link.
fn extract_asin(link: &str) -> String {
    let Some((_, tail)) = link.split_once("/dp/") else {
        return String::new();
    };
    match tail.find('/') {
        Some(idx) => tail[..idx].to_string(),
        None => tail.to_string(),
    }
}

/// Split a relative product link at its tracking parameter. Absolute
/// links cannot be rebuilt against the configured domain and are rejected.
fn split_ref_param(link: &str) -> Option<(String, String)> {
    if link.starts_with("https://") {
        return None;
    }
    let (url, param) = link.split_once("/ref=")?;
    Some((url.to_string(), format!("/ref={param}")))
}
