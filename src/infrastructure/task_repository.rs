//! Repository for the keyword task queue
//!
//! The `keyword_tasks` table is the durable task queue: submission inserts
//! Pending rows (unique keyword constraint deduplicates), the worker
//! dequeues the oldest Pending row, and terminal status updates land here.
//! Rows are never deleted.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::domain::entities::{KeywordTask, TaskStatus, TaskStatusCounts};

#[derive(Clone)]
pub struct TaskRepository {
    pool: SqlitePool,
}

impl TaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a Pending task for `keyword`. Returns false when the keyword
    /// already exists (conflict-ignore on the unique constraint).
    pub async fn submit(&self, keyword: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO keyword_tasks (keyword, status) VALUES (?, ?)",
        )
        .bind(keyword)
        .bind(TaskStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Oldest Pending task, FIFO by creation order.
    pub async fn next_pending(&self) -> Result<Option<KeywordTask>> {
        let row = sqlx::query(
            "SELECT id, keyword, status FROM keyword_tasks WHERE status = ? ORDER BY id ASC LIMIT 1",
        )
        .bind(TaskStatus::Pending.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|row| {
            let status = TaskStatus::parse(&row.get::<String, _>("status"))?;
            Some(KeywordTask {
                id: row.get("id"),
                keyword: row.get("keyword"),
                status,
            })
        }))
    }

    pub async fn update_status(&self, task_id: i64, status: TaskStatus) -> Result<()> {
        sqlx::query(
            "UPDATE keyword_tasks SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(task_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Aggregate task counts for the status query.
    pub async fn status_counts(&self) -> Result<TaskStatusCounts> {
        let mut counts = TaskStatusCounts::default();
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM keyword_tasks GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        for row in rows {
            let n: i64 = row.get("n");
            match TaskStatus::parse(&row.get::<String, _>("status")) {
                Some(TaskStatus::Pending) => counts.pending = n,
                Some(TaskStatus::Completed) => counts.completed = n,
                Some(TaskStatus::Failed) => counts.failed = n,
                None => {}
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database_connection::DatabaseConnection;
    use tempfile::tempdir;

    async fn repo(dir: &tempfile::TempDir) -> TaskRepository {
        let url = format!("sqlite:{}", dir.path().join("tasks.db").display());
        let db = DatabaseConnection::new(&url, 5).await.unwrap();
        db.migrate().await.unwrap();
        TaskRepository::new(db.pool().clone())
    }

    #[tokio::test]
    async fn duplicate_submission_is_skipped() {
        let dir = tempdir().unwrap();
        let tasks = repo(&dir).await;

        assert!(tasks.submit("acme tools").await.unwrap());
        assert!(!tasks.submit("acme tools").await.unwrap());

        let counts = tasks.status_counts().await.unwrap();
        assert_eq!(counts.pending, 1);
    }

    #[tokio::test]
    async fn pending_tasks_dequeue_in_submission_order() {
        let dir = tempdir().unwrap();
        let tasks = repo(&dir).await;

        tasks.submit("first").await.unwrap();
        tasks.submit("second").await.unwrap();

        let task = tasks.next_pending().await.unwrap().unwrap();
        assert_eq!(task.keyword, "first");

        tasks.update_status(task.id, TaskStatus::Completed).await.unwrap();
        let task = tasks.next_pending().await.unwrap().unwrap();
        assert_eq!(task.keyword, "second");

        tasks.update_status(task.id, TaskStatus::Failed).await.unwrap();
        assert!(tasks.next_pending().await.unwrap().is_none());

        let counts = tasks.status_counts().await.unwrap();
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.pending, 0);
    }
}
