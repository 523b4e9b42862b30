//! Domain entities
//!
//! Contains the core crawl entities and their status vocabularies. Status
//! enums are closed so that illegal states are unrepresentable; each one
//! carries its own TEXT codec for SQLite storage.

use serde::{Deserialize, Serialize};

use crate::domain::classify::{CompletenessStatus, TaxIdStatus};

/// Lifecycle of a submitted keyword task.
///
/// Tasks are append-only: they are never deleted, and a Failed task stays
/// Failed until it is resubmitted by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Completed => "Completed",
            TaskStatus::Failed => "Failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(TaskStatus::Pending),
            "Completed" => Some(TaskStatus::Completed),
            "Failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

/// One keyword crawl task as stored in `keyword_tasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordTask {
    pub id: i64,
    pub keyword: String,
    pub status: TaskStatus,
}

/// Per-product processing outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductStatus {
    /// Parsed from a search result page, not yet visited.
    Inserted,
    /// Claimed by the product stage, visit in progress.
    Checking,
    /// Product page visited and classified.
    Done,
    /// Product page carries no seller profile link.
    NoSellerFound,
    /// Retry budget exhausted for this product.
    ErrorExhausted,
}

impl ProductStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProductStatus::Inserted => "Inserted",
            ProductStatus::Checking => "Checking",
            ProductStatus::Done => "Done",
            ProductStatus::NoSellerFound => "NoSellerFound",
            ProductStatus::ErrorExhausted => "ErrorExhausted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Inserted" => Some(ProductStatus::Inserted),
            "Checking" => Some(ProductStatus::Checking),
            "Done" => Some(ProductStatus::Done),
            "NoSellerFound" => Some(ProductStatus::NoSellerFound),
            "ErrorExhausted" => Some(ProductStatus::ErrorExhausted),
            _ => None,
        }
    }
}

/// A candidate product discovered on a search result page.
///
/// `asin` is the dedup key within one search result set; `(asin, keyword)`
/// is the durable dedup key across runs. The seller fields start empty and
/// are filled by the product stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub url: String,
    pub param: String,
    pub title: String,
    pub asin: String,
    pub keyword: String,
    pub bought_count: String,
    pub price: String,
    pub rating: String,
    pub review_count: String,
    pub status: ProductStatus,
    pub seller_id: Option<String>,
    pub brand_name: Option<String>,
    pub brand_store_url: Option<String>,
}

impl ProductRecord {
    /// Whether the search tile carried a recent purchase volume signal.
    pub fn has_purchase_signal(&self) -> bool {
        !self.bought_count.is_empty()
    }
}

/// A seller accepted by the brand-matches-keyword gate, accumulated in
/// memory during the product stage. Keyed by `seller_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredSeller {
    pub seller_id: String,
    pub seller_name: String,
    pub keyword: String,
}

/// Feedback counts from the four optional rating widget subsections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackCounts {
    pub one_month: i64,
    pub three_month: i64,
    pub twelve_month: i64,
    pub lifetime: i64,
}

/// Fully enriched seller record produced by the seller stage.
#[derive(Debug, Clone)]
pub struct SellerDetail {
    pub seller_id: String,
    pub seller_name: String,
    pub keyword: String,
    pub business_name: String,
    pub address: String,
    pub tax_id: String,
    pub tax_id_status: TaxIdStatus,
    pub completeness: CompletenessStatus,
    pub feedback: FeedbackCounts,
}

/// Session cookie lifecycle inside the shared pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieStatus {
    Active,
    Invalid,
}

impl CookieStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CookieStatus::Active => "Active",
            CookieStatus::Invalid => "Invalid",
        }
    }
}

/// Aggregate task counts returned by the status query.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TaskStatusCounts {
    pub pending: i64,
    pub completed: i64,
    pub failed: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_round_trips_through_text() {
        for status in [TaskStatus::Pending, TaskStatus::Completed, TaskStatus::Failed] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("Running"), None);
    }

    #[test]
    fn product_status_round_trips_through_text() {
        for status in [
            ProductStatus::Inserted,
            ProductStatus::Checking,
            ProductStatus::Done,
            ProductStatus::NoSellerFound,
            ProductStatus::ErrorExhausted,
        ] {
            assert_eq!(ProductStatus::parse(status.as_str()), Some(status));
        }
    }
}
