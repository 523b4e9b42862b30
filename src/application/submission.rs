//! Task submission and status services
//!
//! The domain half of the HTTP surface: keyword submission with
//! unique-constraint dedup plus the aggregate status query. Submission
//! wakes the worker through the coalescing notifier.

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::application::worker::TaskNotifier;
use crate::domain::entities::TaskStatusCounts;
use crate::infrastructure::task_repository::TaskRepository;

/// Outcome counts for one submission batch.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SubmissionReport {
    pub total: usize,
    pub inserted: usize,
    pub skipped: usize,
}

#[derive(Clone)]
pub struct TaskSubmissionService {
    tasks: TaskRepository,
    notifier: TaskNotifier,
}

impl TaskSubmissionService {
    pub fn new(tasks: TaskRepository, notifier: TaskNotifier) -> Self {
        Self { tasks, notifier }
    }

    /// Insert a Pending task per unseen keyword and wake the worker.
    pub async fn submit_keywords(&self, keywords: &[String]) -> Result<SubmissionReport> {
        let mut report = SubmissionReport {
            total: keywords.len(),
            ..Default::default()
        };

        for keyword in keywords {
            match self.tasks.submit(keyword).await {
                Ok(true) => {
                    info!("Keyword queued: {}", keyword);
                    report.inserted += 1;
                }
                Ok(false) => {
                    info!("Keyword already present, skipped: {}", keyword);
                    report.skipped += 1;
                }
                Err(err) => {
                    warn!("Failed to queue keyword '{}': {err}", keyword);
                }
            }
        }

        info!(
            "Submission handled: total={} inserted={} skipped={}",
            report.total, report.inserted, report.skipped
        );
        self.notifier.notify();
        Ok(report)
    }

    /// Aggregate task counts by status.
    pub async fn status_counts(&self) -> Result<TaskStatusCounts> {
        self.tasks.status_counts().await
    }
}
