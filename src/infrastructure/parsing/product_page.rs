//! Product detail page parser
//!
//! Extracts the seller-profile link and the brand byline from one product
//! page. The seller link is mandatory: a page without it is classified
//! `NoSellerLink` by the product stage.

use anyhow::Result;
use scraper::{Html, Selector};
use tracing::debug;

use crate::domain::error::{CrawlError, CrawlResult};
use crate::infrastructure::parsing::{compile_selector, is_verification_page};

/// Seller and brand facts extracted from a product page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductPage {
    pub seller_id: Option<String>,
    pub seller_name: String,
    /// Lowercased brand byline, empty when the page has none.
    pub brand_name: String,
    pub brand_store_url: Option<String>,
}

/// Parser for product detail pages.
pub struct ProductPageParser {
    seller_link: Selector,
    byline: Selector,
}

impl ProductPageParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            seller_link: compile_selector("a#sellerProfileTriggerId")?,
            byline: compile_selector("a#bylineInfo")?,
        })
    }

    pub fn parse(&self, html: &Html) -> CrawlResult<ProductPage> {
        if is_verification_page(html) {
            return Err(CrawlError::VerificationRequired);
        }

        let Some(link) = html.select(&self.seller_link).next() else {
            return Err(CrawlError::NoSellerLink);
        };
        let href = link.value().attr("href").ok_or(CrawlError::NoSellerLink)?;

        let seller_name = link.text().collect::<String>().trim().to_string();
        let seller_id = extract_seller_id(href);

        let mut page = ProductPage {
            seller_id,
            seller_name,
            brand_name: String::new(),
            brand_store_url: None,
        };

        if let Some(byline) = html.select(&self.byline).next() {
            let brand_text = byline.text().collect::<String>().trim().to_string();
            if brand_text.contains("Brand:") {
                page.brand_name = brand_text.replace("Brand:", "").trim().to_string();
            } else if brand_text.contains("Visit the") && brand_text.contains("Store") {
                page.brand_store_url = byline.value().attr("href").map(str::to_string);
                if let Some((_, tail)) = brand_text.split_once("Visit the") {
                    if let Some((brand, _)) = tail.split_once("Store") {
                        page.brand_name = brand.trim().to_string();
                    }
                }
            } else {
                page.brand_name = brand_text;
            }
            page.brand_name = page.brand_name.to_lowercase();
            debug!("Extracted brand byline: {}", page.brand_name);
        }

        Ok(page)
    }
}

/// Pull the seller id out of a `/sp?...&seller=...` profile link.
fn extract_seller_id(href: &str) -> Option<String> {
    href.split('&').find_map(|part| {
        part.strip_prefix("seller=")
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product_html(seller: Option<(&str, &str)>, byline: Option<(&str, &str)>) -> Html {
        let seller_link = seller
            .map(|(id, name)| {
                format!(r#"<a id="sellerProfileTriggerId" href="/sp?ie=UTF8&seller={id}">{name}</a>"#)
            })
            .unwrap_or_default();
        let byline_link = byline
            .map(|(href, text)| format!(r#"<a id="bylineInfo" href="{href}">{text}</a>"#))
            .unwrap_or_default();
        Html::parse_document(&format!(
            "<html><body>{seller_link}{byline_link}</body></html>"
        ))
    }

    #[test]
    fn seller_id_and_name_are_extracted_from_the_profile_link() {
        let parser = ProductPageParser::new().unwrap();
        let html = product_html(Some(("A1B2", "Acme Storefront")), None);
        let page = parser.parse(&html).unwrap();
        assert_eq!(page.seller_id.as_deref(), Some("A1B2"));
        assert_eq!(page.seller_name, "Acme Storefront");
        assert_eq!(page.brand_name, "");
    }

    #[test]
    fn missing_seller_link_is_the_no_seller_error() {
        let parser = ProductPageParser::new().unwrap();
        let html = product_html(None, Some(("/stores/acme", "Visit the Acme Store")));
        assert!(matches!(parser.parse(&html), Err(CrawlError::NoSellerLink)));
    }

    #[test]
    fn brand_prefix_byline_is_stripped_and_lowercased() {
        let parser = ProductPageParser::new().unwrap();
        let html = product_html(
            Some(("A1B2", "Acme Storefront")),
            Some(("/brand", "Brand: Acme Tools")),
        );
        let page = parser.parse(&html).unwrap();
        assert_eq!(page.brand_name, "acme tools");
        assert!(page.brand_store_url.is_none());
    }

    #[test]
    fn storefront_byline_yields_brand_and_store_url() {
        let parser = ProductPageParser::new().unwrap();
        let html = product_html(
            Some(("A1B2", "Acme Storefront")),
            Some(("/stores/acme-tools", "Visit the Acme Tools Store")),
        );
        let page = parser.parse(&html).unwrap();
        assert_eq!(page.brand_name, "acme tools");
        assert_eq!(page.brand_store_url.as_deref(), Some("/stores/acme-tools"));
    }

    #[test]
    fn verification_heading_maps_to_the_shared_error() {
        let parser = ProductPageParser::new().unwrap();
        let html = Html::parse_document(
            "<html><body><h4>Enter the characters you see below</h4></body></html>",
        );
        assert!(matches!(parser.parse(&html), Err(CrawlError::VerificationRequired)));
    }
}
