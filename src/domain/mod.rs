//! Domain layer
//!
//! Core business entities, pure classification logic, and the service
//! traits implemented by the infrastructure layer.

pub mod classify;
pub mod entities;
pub mod error;
pub mod services;

pub use classify::{classify_completeness, classify_tax_id, CompletenessStatus, TaxIdStatus};
pub use entities::{
    CookieStatus, DiscoveredSeller, FeedbackCounts, KeywordTask, ProductRecord, ProductStatus,
    SellerDetail, TaskStatus, TaskStatusCounts,
};
pub use error::{CrawlError, CrawlResult};
pub use services::{AllowAllGate, ComplianceGate, PageFetcher};
