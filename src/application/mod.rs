//! Application layer
//!
//! Orchestration over the domain and infrastructure: the per-task crawl
//! pipeline, its stage executors, the single-consumer task worker, and the
//! submission service behind the HTTP surface.

pub mod context;
pub mod pipeline;
pub mod stages;
pub mod submission;
pub mod worker;

pub use context::AppContext;
pub use pipeline::CrawlPipeline;
pub use submission::{SubmissionReport, TaskSubmissionService};
pub use worker::{TaskNotifier, TaskWorker};
