//! Repository for operational run records
//!
//! `search_runs` tracks one row per search stage attempt (opened at stage
//! entry, closed exactly once with the admitted candidate count);
//! `app_runs` tracks process lifetimes for operational observability.
//! Neither table participates in crawl correctness.

use anyhow::Result;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct RunRepository {
    pool: SqlitePool,
}

impl RunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a search run for a task. Returns the run id.
    pub async fn open_search_run(&self, task_id: i64, app_id: i64) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO search_runs (task_id, app_id, status) VALUES (?, ?, 'Started')",
        )
        .bind(task_id)
        .bind(app_id)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Close a search run with the count of admitted candidates. A closed
    /// run is never reopened.
    pub async fn close_search_run(&self, run_id: i64, valid: i64) -> Result<()> {
        sqlx::query(
            "UPDATE search_runs SET status = 'Finished', valid = ?, ended_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(valid)
        .bind(run_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record process start. Returns the run id handed to the shutdown path.
    pub async fn start_app_run(&self, app_id: i64) -> Result<i64> {
        let result = sqlx::query("INSERT INTO app_runs (app_id, status) VALUES (?, 'Running')")
            .bind(app_id)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Record process shutdown. Best effort on the signal path.
    pub async fn finish_app_run(&self, run_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE app_runs SET status = 'Stopped', ended_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(run_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
