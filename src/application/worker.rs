//! Task worker
//!
//! Single-consumer scheduler over the durable task queue. Wakes on a
//! coalesced notification (capacity-1 channel, droppable send) or on a
//! safety-net timer, then drains the Pending queue in FIFO order, one task
//! at a time. Cancellation is cooperative and only observed between tasks.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::application::context::AppContext;
use crate::application::pipeline::CrawlPipeline;
use crate::domain::entities::TaskStatus;
use crate::infrastructure::task_repository::TaskRepository;

/// Handle used by the submission path to wake the worker. A burst of
/// notifications collapses into a single wake-up.
#[derive(Clone)]
pub struct TaskNotifier {
    tx: mpsc::Sender<()>,
}

impl TaskNotifier {
    /// Non-blocking wake signal; dropped when a wake is already queued.
    pub fn notify(&self) {
        let _ = self.tx.try_send(());
    }
}

pub struct TaskWorker {
    pipeline: CrawlPipeline,
    tasks: TaskRepository,
    wake_rx: mpsc::Receiver<()>,
    cancel: CancellationToken,
    poll_interval: Duration,
}

impl TaskWorker {
    /// Build the worker and its notifier handle.
    pub fn new(ctx: AppContext, cancel: CancellationToken) -> Result<(Self, TaskNotifier)> {
        let (tx, wake_rx) = mpsc::channel(1);
        let poll_interval = Duration::from_secs(ctx.config.crawler.worker_poll_seconds);
        let tasks = TaskRepository::new(ctx.db.clone());
        let pipeline = CrawlPipeline::new(ctx)?;

        Ok((
            Self {
                pipeline,
                tasks,
                wake_rx,
                cancel,
                poll_interval,
            },
            TaskNotifier { tx },
        ))
    }

    /// Worker loop. Returns when the cancellation token fires between
    /// tasks.
    pub async fn run(mut self) {
        info!("Task worker started, waiting for work");
        let mut ticker = tokio::time::interval(self.poll_interval);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Task worker received stop signal");
                    return;
                }
                _ = self.wake_rx.recv() => {
                    self.drain_pending().await;
                }
                _ = ticker.tick() => {
                    self.drain_pending().await;
                }
            }
        }
    }

    /// Run every Pending task to completion, oldest first. Stops early
    /// only when cancellation fires between tasks.
    async fn drain_pending(&self) {
        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            let task = match self.tasks.next_pending().await {
                Ok(Some(task)) => task,
                Ok(None) => return,
                Err(err) => {
                    error!("Failed to dequeue task: {err}");
                    return;
                }
            };

            info!("Dequeued task {} keyword='{}'", task.id, task.keyword);
            match self.pipeline.execute(&task).await {
                Ok(report) => {
                    info!(
                        "Task {} completed: products={} sellers={} shops={}",
                        task.id, report.products, report.sellers, report.shops
                    );
                }
                Err(err) => {
                    error!("Task {} failed: {err:#}", task.id);
                    if let Err(update_err) =
                        self.tasks.update_status(task.id, TaskStatus::Failed).await
                    {
                        error!("Failed to mark task {} failed: {update_err}", task.id);
                    }
                }
            }
        }
    }
}
