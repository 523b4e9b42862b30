//! Repository for stored product rows
//!
//! Supports the batch recheck path of the product stage: claiming stored
//! rows into `Checking` status, loading them, and writing back per-row
//! outcomes. The memory-passing pipeline does not touch this table until
//! its terminal batch commit.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::domain::entities::{ProductRecord, ProductStatus};

/// A product row loaded for rechecking.
#[derive(Debug, Clone)]
pub struct StoredProduct {
    pub id: i64,
    pub record: ProductRecord,
}

#[derive(Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Claim up to `limit` rows of one keyword for rechecking: Inserted
    /// rows and previously exhausted ones flip to Checking under this
    /// process's app id.
    pub async fn claim_for_check(&self, keyword: &str, app_id: i64, limit: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE products SET status = ?, app_id = ?
            WHERE id IN (
                SELECT id FROM products
                WHERE (status = ? OR status = ?) AND keyword = ?
                ORDER BY id LIMIT ?
            )
            "#,
        )
        .bind(ProductStatus::Checking.as_str())
        .bind(app_id)
        .bind(ProductStatus::Inserted.as_str())
        .bind(ProductStatus::ErrorExhausted.as_str())
        .bind(keyword)
        .bind(limit)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Load the rows this process claimed.
    pub async fn fetch_checking(&self, keyword: &str, app_id: i64) -> Result<Vec<StoredProduct>> {
        let rows = sqlx::query(
            r#"
            SELECT id, url, param, title, asin, keyword, bought_count, price, rating, review_count
            FROM products WHERE status = ? AND app_id = ? AND keyword = ?
            ORDER BY id
            "#,
        )
        .bind(ProductStatus::Checking.as_str())
        .bind(app_id)
        .bind(keyword)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| StoredProduct {
                id: row.get("id"),
                record: ProductRecord {
                    url: row.get("url"),
                    param: row.get("param"),
                    title: row.get("title"),
                    asin: row.get("asin"),
                    keyword: row.get("keyword"),
                    bought_count: row.get("bought_count"),
                    price: row.get("price"),
                    rating: row.get("rating"),
                    review_count: row.get("review_count"),
                    status: ProductStatus::Checking,
                    seller_id: None,
                    brand_name: None,
                    brand_store_url: None,
                },
            })
            .collect())
    }

    /// Write one row's recheck outcome back.
    pub async fn update_outcome(&self, id: i64, app_id: i64, record: &ProductRecord) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE products SET
                status = ?, app_id = ?, seller_id = ?, brand_name = ?, brand_store_url = ?
            WHERE id = ?
            "#,
        )
        .bind(record.status.as_str())
        .bind(app_id)
        .bind(&record.seller_id)
        .bind(&record.brand_name)
        .bind(&record.brand_store_url)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database_connection::DatabaseConnection;
    use tempfile::tempdir;

    async fn seeded_repo(dir: &tempfile::TempDir) -> ProductRepository {
        let url = format!("sqlite:{}", dir.path().join("products.db").display());
        let db = DatabaseConnection::new(&url, 5).await.unwrap();
        db.migrate().await.unwrap();
        let pool = db.pool().clone();

        for (asin, status) in [
            ("B000AAAA01", "Inserted"),
            ("B000AAAA02", "ErrorExhausted"),
            ("B000AAAA03", "Done"),
        ] {
            sqlx::query(
                "INSERT INTO products (url, param, title, asin, keyword, status) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(format!("/dp/{asin}"))
            .bind("/ref=sr_1_1")
            .bind("Widget")
            .bind(asin)
            .bind("acme tools")
            .bind(status)
            .execute(&pool)
            .await
            .unwrap();
        }
        ProductRepository::new(pool)
    }

    #[tokio::test]
    async fn claim_flips_unfinished_rows_only() {
        let dir = tempdir().unwrap();
        let repo = seeded_repo(&dir).await;

        let claimed = repo.claim_for_check("acme tools", 1, 1000).await.unwrap();
        assert_eq!(claimed, 2, "Done rows must not be reclaimed");

        let stored = repo.fetch_checking("acme tools", 1).await.unwrap();
        let asins: Vec<&str> = stored.iter().map(|p| p.record.asin.as_str()).collect();
        assert_eq!(asins, vec!["B000AAAA01", "B000AAAA02"]);
    }

    #[tokio::test]
    async fn outcome_update_stamps_seller_fields() {
        let dir = tempdir().unwrap();
        let repo = seeded_repo(&dir).await;
        repo.claim_for_check("acme tools", 1, 1000).await.unwrap();
        let stored = repo.fetch_checking("acme tools", 1).await.unwrap();

        let mut record = stored[0].record.clone();
        record.status = ProductStatus::Done;
        record.seller_id = Some("A1B2".to_string());
        record.brand_name = Some("acme tools".to_string());
        repo.update_outcome(stored[0].id, 1, &record).await.unwrap();

        let remaining = repo.fetch_checking("acme tools", 1).await.unwrap();
        assert_eq!(remaining.len(), 1, "updated row left Checking status");
    }
}
