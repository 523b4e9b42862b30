//! Crawl pipeline orchestrator
//!
//! Sequences the three stages for one keyword task in memory-passing mode
//! and hands everything the run produced to the batch persistence layer
//! for a single atomic commit. Stage ordering is strict: search, then
//! product, then seller.

use anyhow::{Context, Result};
use tracing::info;

use crate::application::context::AppContext;
use crate::application::stages::{ProductStage, SearchStage, SellerStage};
use crate::domain::entities::KeywordTask;
use crate::infrastructure::batch_persistence::{BatchPersistence, BatchReport};

pub struct CrawlPipeline {
    ctx: AppContext,
    search: SearchStage,
    product: ProductStage,
    seller: SellerStage,
    batch: BatchPersistence,
}

impl CrawlPipeline {
    pub fn new(ctx: AppContext) -> Result<Self> {
        let batch = BatchPersistence::new(
            ctx.db.clone(),
            ctx.app_id(),
            ctx.domain(),
            &ctx.config.basic.marketplace,
        );
        Ok(Self {
            search: SearchStage::new()?,
            product: ProductStage::new()?,
            seller: SellerStage::new()?,
            batch,
            ctx,
        })
    }

    /// Run the full pipeline for one task.
    ///
    /// On success the task is already marked Completed inside the batch
    /// transaction. On error nothing from this run is visible and the
    /// caller marks the task Failed.
    pub async fn execute(&self, task: &KeywordTask) -> Result<BatchReport> {
        info!("========================================");
        info!("Crawling keyword '{}' (task {})", task.keyword, task.id);
        info!("========================================");

        let mut products = self
            .search
            .run(&self.ctx, task)
            .await
            .with_context(|| format!("Search stage failed for '{}'", task.keyword))?;

        if products.is_empty() {
            info!("No products found for '{}'", task.keyword);
            return self
                .batch
                .save_task_results(task.id, &task.keyword, &[], &[])
                .await;
        }

        let discovered = self
            .product
            .run(&self.ctx, &mut products, &task.keyword)
            .await;

        let details = if discovered.is_empty() {
            info!("No sellers accepted for '{}'", task.keyword);
            Vec::new()
        } else {
            self.seller.run(&self.ctx, discovered).await
        };

        let report = self
            .batch
            .save_task_results(task.id, &task.keyword, &products, &details)
            .await
            .with_context(|| format!("Batch persistence failed for '{}'", task.keyword))?;

        info!("========================================");
        info!(
            "Keyword '{}' done: products={} sellers={}",
            task.keyword, report.products, report.sellers
        );
        info!("========================================");
        Ok(report)
    }
}
