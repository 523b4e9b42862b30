// Database connection and pool management
// This module handles SQLite database connections using sqlx

use std::path::Path;

use anyhow::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        // Create database file directory if it doesn't exist
        let db_path = if database_url.starts_with("sqlite://") {
            database_url.trim_start_matches("sqlite://")
        } else if database_url.starts_with("sqlite:") {
            database_url.trim_start_matches("sqlite:")
        } else {
            database_url
        };

        if db_path != ":memory:" && !Path::new(db_path).exists() {
            if let Some(parent) = Path::new(db_path).parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::File::create(db_path)?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        let create_tasks_sql = r#"
            CREATE TABLE IF NOT EXISTS keyword_tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                keyword TEXT NOT NULL UNIQUE,
                status TEXT NOT NULL DEFAULT 'Pending',
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
        "#;

        let create_search_runs_sql = r#"
            CREATE TABLE IF NOT EXISTS search_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id INTEGER NOT NULL,
                app_id INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'Started',
                valid INTEGER NOT NULL DEFAULT 0,
                started_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                ended_at DATETIME
            )
        "#;

        let create_products_sql = r#"
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                param TEXT NOT NULL,
                title TEXT NOT NULL,
                asin TEXT NOT NULL,
                keyword TEXT NOT NULL,
                bought_count TEXT NOT NULL DEFAULT '',
                price TEXT NOT NULL DEFAULT '',
                rating TEXT NOT NULL DEFAULT '',
                review_count TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'Inserted',
                seller_id TEXT,
                brand_name TEXT,
                brand_store_url TEXT,
                app_id INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (asin, keyword)
            )
        "#;

        let create_sellers_sql = r#"
            CREATE TABLE IF NOT EXISTS sellers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                seller_id TEXT NOT NULL UNIQUE,
                seller_name TEXT NOT NULL DEFAULT '',
                keyword TEXT NOT NULL,
                business_name TEXT NOT NULL DEFAULT '',
                address TEXT NOT NULL DEFAULT '',
                tax_id TEXT NOT NULL DEFAULT '',
                tax_id_status INTEGER NOT NULL DEFAULT 0,
                completeness INTEGER NOT NULL DEFAULT 0,
                feedback_1m INTEGER NOT NULL DEFAULT 0,
                feedback_3m INTEGER NOT NULL DEFAULT 0,
                feedback_12m INTEGER NOT NULL DEFAULT 0,
                feedback_lifetime INTEGER NOT NULL DEFAULT 0,
                app_id INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
        "#;

        let create_shop_profiles_sql = r#"
            CREATE TABLE IF NOT EXISTS shop_profiles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                domain TEXT NOT NULL,
                seller_id TEXT NOT NULL,
                shop_name TEXT NOT NULL DEFAULT '',
                shop_url TEXT NOT NULL DEFAULT '',
                marketplace TEXT NOT NULL DEFAULT '',
                business_name TEXT NOT NULL DEFAULT '',
                address TEXT NOT NULL DEFAULT '',
                feedback_1m INTEGER NOT NULL DEFAULT 0,
                feedback_3m INTEGER NOT NULL DEFAULT 0,
                feedback_12m INTEGER NOT NULL DEFAULT 0,
                feedback_lifetime INTEGER NOT NULL DEFAULT 0,
                crawled_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (domain, seller_id)
            )
        "#;

        let create_cookies_sql = r#"
            CREATE TABLE IF NOT EXISTS cookies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                cookie TEXT NOT NULL,
                zipcode TEXT NOT NULL DEFAULT '',
                city TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'Active',
                host_id INTEGER,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
        "#;

        let create_app_runs_sql = r#"
            CREATE TABLE IF NOT EXISTS app_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                app_id INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'Running',
                started_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                ended_at DATETIME
            )
        "#;

        let create_indexes_sql = [
            "CREATE INDEX IF NOT EXISTS idx_tasks_status ON keyword_tasks (status)",
            "CREATE INDEX IF NOT EXISTS idx_search_runs_task ON search_runs (task_id)",
            "CREATE INDEX IF NOT EXISTS idx_products_keyword ON products (keyword)",
            "CREATE INDEX IF NOT EXISTS idx_products_status ON products (status)",
            "CREATE INDEX IF NOT EXISTS idx_sellers_keyword ON sellers (keyword)",
            "CREATE INDEX IF NOT EXISTS idx_cookies_host ON cookies (host_id, status)",
        ];

        sqlx::query(create_tasks_sql).execute(&self.pool).await?;
        sqlx::query(create_search_runs_sql).execute(&self.pool).await?;
        sqlx::query(create_products_sql).execute(&self.pool).await?;
        sqlx::query(create_sellers_sql).execute(&self.pool).await?;
        sqlx::query(create_shop_profiles_sql).execute(&self.pool).await?;
        sqlx::query(create_cookies_sql).execute(&self.pool).await?;
        sqlx::query(create_app_runs_sql).execute(&self.pool).await?;
        for index_sql in create_indexes_sql {
            sqlx::query(index_sql).execute(&self.pool).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_database_connection() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("test.db");
        let database_url = format!("sqlite:{}", db_path.to_string_lossy());

        let db = DatabaseConnection::new(&database_url, 5).await?;
        assert!(!db.pool().is_closed());
        Ok(())
    }

    #[tokio::test]
    async fn test_database_migration() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("test_migration.db");
        let database_url = format!("sqlite:{}", db_path.display());

        let db = DatabaseConnection::new(&database_url, 5).await?;
        db.migrate().await?;

        for table in [
            "keyword_tasks",
            "search_runs",
            "products",
            "sellers",
            "shop_profiles",
            "cookies",
            "app_runs",
        ] {
            let result =
                sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name=?")
                    .bind(table)
                    .fetch_optional(db.pool())
                    .await?;
            assert!(result.is_some(), "missing table {table}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_migration_is_idempotent() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("test_idempotent.db");
        let database_url = format!("sqlite:{}", db_path.display());

        let db = DatabaseConnection::new(&database_url, 5).await?;
        db.migrate().await?;
        db.migrate().await?;
        Ok(())
    }
}
