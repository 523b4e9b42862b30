//! HTML parsing infrastructure
//!
//! Field extraction from the three marketplace page kinds. Selectors are
//! compiled once per parser; the selector strings are the volatile part of
//! this system and are kept together here rather than spread through the
//! stages.

pub mod product_page;
pub mod search_results;
pub mod seller_page;

pub use product_page::{ProductPage, ProductPageParser};
pub use search_results::SearchResultParser;
pub use seller_page::{SellerPageParser, SellerProfilePage};

use anyhow::Result;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

/// Compile a selector literal, reporting the offending string on failure.
pub(crate) fn compile_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| anyhow::anyhow!("Failed to compile selector '{selector}': {e}"))
}

static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("static selector"));
static CAPTCHA_FORM_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"form[action*="/captcha/"]"#).expect("static selector"));
static HEADING_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h4").expect("static selector"));

/// Detect the marketplace anti-automation interstitial.
///
/// Matches any of the known verification shapes: challenge titles, a
/// captcha form, or the challenge heading used on product pages.
pub fn is_verification_page(html: &Html) -> bool {
    if let Some(title) = html.select(&TITLE_SELECTOR).next() {
        let title = title.text().collect::<String>();
        if title.contains("Enter the characters")
            || title.contains("Type the characters")
            || title.contains("Robot check")
        {
            return true;
        }
    }

    if html.select(&CAPTCHA_FORM_SELECTOR).next().is_some() {
        return true;
    }

    if let Some(h4) = html.select(&HEADING_SELECTOR).next() {
        if h4.text().collect::<String>().trim() == "Enter the characters you see below" {
            return true;
        }
    }

    false
}

/// Parse the leading integer of a widget count such as `1,234 ratings`.
/// Missing or malformed counts collapse to zero.
pub(crate) fn parse_leading_count(text: &str) -> i64 {
    let cleaned = text.trim().replace(',', "");
    let digits: String = cleaned.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_page_is_detected_by_title() {
        let html = Html::parse_document(
            "<html><head><title>Robot check</title></head><body></body></html>",
        );
        assert!(is_verification_page(&html));
    }

    #[test]
    fn verification_page_is_detected_by_captcha_form() {
        let html = Html::parse_document(
            r#"<html><body><form action="/captcha/validate"></form></body></html>"#,
        );
        assert!(is_verification_page(&html));
    }

    #[test]
    fn verification_page_is_detected_by_challenge_heading() {
        let html = Html::parse_document(
            "<html><body><h4>Enter the characters you see below</h4></body></html>",
        );
        assert!(is_verification_page(&html));
    }

    #[test]
    fn ordinary_pages_are_not_verification_pages() {
        let html = Html::parse_document(
            "<html><head><title>power drill - search results</title></head><body></body></html>",
        );
        assert!(!is_verification_page(&html));
    }

    #[test]
    fn leading_count_parsing_tolerates_commas_and_suffixes() {
        assert_eq!(parse_leading_count("1,234 ratings"), 1234);
        assert_eq!(parse_leading_count("87"), 87);
        assert_eq!(parse_leading_count(""), 0);
        assert_eq!(parse_leading_count("(321)"), 0);
    }
}
