//! Seller profile page parser
//!
//! The registration block is free text inside a span-heavy container:
//! field labels and their values wrap across arbitrary line boundaries.
//! Accumulation is a line-oriented state machine - a recognized label line
//! opens a field, any other line is appended (space-joined) to the open
//! field. The four feedback widget subsections are independently optional.

use anyhow::Result;
use scraper::{Html, Selector};

use crate::domain::entities::FeedbackCounts;
use crate::domain::error::{CrawlError, CrawlResult};
use crate::infrastructure::parsing::{compile_selector, is_verification_page, parse_leading_count};

/// Field labels that open a new accumulation field.
const FIELD_LABELS: [&str; 4] = [
    "Business Name:",
    "Business Type:",
    "Address:",
    "VAT Number:",
];

/// Raw registration facts parsed from one seller profile page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SellerProfilePage {
    pub business_name: String,
    pub address: String,
    pub tax_id: String,
    pub feedback: FeedbackCounts,
}

/// Parser for seller profile pages.
pub struct SellerPageParser {
    info_section: Selector,
    info_spans: Selector,
    feedback_summary: Selector,
    rating_thirty: Selector,
    rating_ninety: Selector,
    rating_year: Selector,
    rating_lifetime: Selector,
    rating_count: Selector,
}

impl SellerPageParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            info_section: compile_selector("div#page-section-detail-seller-info")?,
            info_spans: compile_selector("span")?,
            feedback_summary: compile_selector("div#seller-feedback-summary-rating")?,
            rating_thirty: compile_selector("div#rating-thirty")?,
            rating_ninety: compile_selector("div#rating-ninety")?,
            rating_year: compile_selector("div#rating-year")?,
            rating_lifetime: compile_selector("div#rating-lifetime")?,
            rating_count: compile_selector("span.ratings-reviews-count")?,
        })
    }

    pub fn parse(&self, html: &Html) -> CrawlResult<SellerProfilePage> {
        if is_verification_page(html) {
            return Err(CrawlError::VerificationRequired);
        }

        let mut page = SellerProfilePage::default();

        if let Some(section) = html.select(&self.info_section).next() {
            let text = section
                .select(&self.info_spans)
                .map(|span| span.text().collect::<String>())
                .collect::<Vec<String>>()
                .join("\n");

            for field in accumulate_field_lines(&text) {
                if field.contains("Business Name:") {
                    page.business_name = field.replace("Business Name:", "").trim().to_string();
                } else if field.contains("Address:") {
                    page.address = field.replace("Address:", "").trim().to_string();
                } else if field.contains("VAT Number:") {
                    page.tax_id = field.replace("VAT Number:", "").trim().to_string();
                }
            }
        }

        if let Some(summary) = html.select(&self.feedback_summary).next() {
            let count = |subsection: &Selector| -> i64 {
                summary
                    .select(subsection)
                    .next()
                    .and_then(|el| el.select(&self.rating_count).next())
                    .map(|el| parse_leading_count(&el.text().collect::<String>()))
                    .unwrap_or(0)
            };
            page.feedback = FeedbackCounts {
                one_month: count(&self.rating_thirty),
                three_month: count(&self.rating_ninety),
                twelve_month: count(&self.rating_year),
                lifetime: count(&self.rating_lifetime),
            };
        }

        Ok(page)
    }
}

/// Sequential field accumulation over the registration text block.
///
/// A line containing a recognized label starts a new field; any other
/// non-empty line is appended, space-joined, to the most recently started
/// field. Lines arriving before the first label are dropped.
pub fn accumulate_field_lines(text: &str) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if FIELD_LABELS.iter().any(|label| line.contains(label)) {
            fields.push(line.to_string());
        } else if let Some(open) = fields.last_mut() {
            open.push(' ');
            open.push_str(line);
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_open_fields_and_bare_lines_append() {
        let text = "Business Name:\nAcme Tools\nCo Ltd\nAddress:\n1 Main St\nSpringfield\nVAT Number: GB123456789";
        let fields = accumulate_field_lines(text);
        assert_eq!(
            fields,
            vec![
                "Business Name: Acme Tools Co Ltd",
                "Address: 1 Main St Springfield",
                "VAT Number: GB123456789",
            ]
        );
    }

    #[test]
    fn leading_unlabeled_lines_are_dropped() {
        let fields = accumulate_field_lines("Detailed Seller Information\nBusiness Name: Acme");
        assert_eq!(fields, vec!["Business Name: Acme"]);
    }

    fn seller_html(info_lines: &str, feedback: Option<(&str, &str, &str, &str)>) -> Html {
        let feedback_html = feedback
            .map(|(m1, m3, m12, life)| {
                format!(
                    r#"<div id="seller-feedback-summary-rating">
                        <div id="rating-thirty"><span class="ratings-reviews-count">{m1}</span></div>
                        <div id="rating-ninety"><span class="ratings-reviews-count">{m3}</span></div>
                        <div id="rating-year"><span class="ratings-reviews-count">{m12}</span></div>
                        <div id="rating-lifetime"><span class="ratings-reviews-count">{life}</span></div>
                    </div>"#
                )
            })
            .unwrap_or_default();
        Html::parse_document(&format!(
            r#"<html><body>
                <div id="page-section-detail-seller-info"><span>{info_lines}</span></div>
                {feedback_html}
            </body></html>"#
        ))
    }

    #[test]
    fn registration_block_with_wrapped_values_parses() {
        let parser = SellerPageParser::new().unwrap();
        let html = seller_html(
            "Business Name:\nAcme Tools Co Ltd\nAddress:\n1 Main St\nSpringfield\nVAT Number:\n911234567890123456",
            None,
        );
        let page = parser.parse(&html).unwrap();
        assert_eq!(page.business_name, "Acme Tools Co Ltd");
        assert_eq!(page.address, "1 Main St Springfield");
        assert_eq!(page.tax_id, "911234567890123456");
    }

    #[test]
    fn feedback_subsections_parse_independently() {
        let parser = SellerPageParser::new().unwrap();
        let html = seller_html(
            "Business Name: Acme",
            Some(("12", "1,034", "2,500", "10,942")),
        );
        let page = parser.parse(&html).unwrap();
        assert_eq!(
            page.feedback,
            FeedbackCounts {
                one_month: 12,
                three_month: 1034,
                twelve_month: 2500,
                lifetime: 10942,
            }
        );
    }

    #[test]
    fn missing_widgets_collapse_to_zero() {
        let parser = SellerPageParser::new().unwrap();
        let html = seller_html("Business Name: Acme", None);
        let page = parser.parse(&html).unwrap();
        assert_eq!(page.feedback, FeedbackCounts::default());
    }
}
