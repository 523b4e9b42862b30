//! Atomic batch persistence for one completed keyword run
//!
//! After the three pipeline stages finish in memory, everything the run
//! produced is committed in a single transaction: products (conflict
//! ignored - reruns are expected), sellers (try-insert then update-in-place
//! on the uniqueness conflict, no pre-check so there is no race window),
//! shop profiles (existence check then insert-or-update - this table is
//! keyed by `(domain, seller_id)`, not by the seller table's key), and the
//! terminal task status. Any failure rolls the whole run back.

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::domain::entities::{ProductRecord, SellerDetail, TaskStatus};

/// Row counts from one committed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub products: u64,
    pub sellers: u64,
    pub shops: u64,
}

#[derive(Clone)]
pub struct BatchPersistence {
    pool: SqlitePool,
    app_id: i64,
    marketplace_host: String,
    marketplace: String,
}

impl BatchPersistence {
    pub fn new(pool: SqlitePool, app_id: i64, marketplace_host: &str, marketplace: &str) -> Self {
        Self {
            pool,
            app_id,
            marketplace_host: marketplace_host.to_string(),
            marketplace: marketplace.to_string(),
        }
    }

    /// Commit all results of one keyword task and mark it Completed, in a
    /// single transaction.
    pub async fn save_task_results(
        &self,
        task_id: i64,
        keyword: &str,
        products: &[ProductRecord],
        sellers: &[SellerDetail],
    ) -> Result<BatchReport> {
        let mut tx = self.pool.begin().await.context("Failed to begin batch transaction")?;
        let mut report = BatchReport::default();

        for product in products {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO products
                (url, param, title, asin, keyword, bought_count, price, rating, review_count,
                 status, seller_id, brand_name, brand_store_url, app_id)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&product.url)
            .bind(&product.param)
            .bind(&product.title)
            .bind(&product.asin)
            .bind(&product.keyword)
            .bind(&product.bought_count)
            .bind(&product.price)
            .bind(&product.rating)
            .bind(&product.review_count)
            .bind(product.status.as_str())
            .bind(&product.seller_id)
            .bind(&product.brand_name)
            .bind(&product.brand_store_url)
            .bind(self.app_id)
            .execute(&mut *tx)
            .await
            .context("Failed to insert product")?;
            report.products += result.rows_affected();
        }

        for seller in sellers {
            self.upsert_seller(&mut tx, seller).await?;
            report.sellers += 1;
        }

        for seller in sellers {
            self.upsert_shop_profile(&mut tx, seller).await?;
            report.shops += 1;
        }

        sqlx::query(
            "UPDATE keyword_tasks SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(TaskStatus::Completed.as_str())
        .bind(task_id)
        .execute(&mut *tx)
        .await
        .context("Failed to mark task completed")?;

        tx.commit().await.context("Failed to commit batch transaction")?;

        info!(
            "Batch committed for '{}': products={} sellers={} shops={}",
            keyword, report.products, report.sellers, report.shops
        );
        Ok(report)
    }

    /// Commit seller and shop profile rows alone, outside any task run.
    /// Used by the stored-row recheck path, which has no task to close.
    pub async fn save_sellers(&self, sellers: &[SellerDetail]) -> Result<BatchReport> {
        let mut tx = self.pool.begin().await.context("Failed to begin batch transaction")?;
        let mut report = BatchReport::default();

        for seller in sellers {
            self.upsert_seller(&mut tx, seller).await?;
            report.sellers += 1;
        }
        for seller in sellers {
            self.upsert_shop_profile(&mut tx, seller).await?;
            report.shops += 1;
        }

        tx.commit().await.context("Failed to commit batch transaction")?;
        Ok(report)
    }

    /// Upsert one seller: try-insert, and on the uniqueness conflict fall
    /// back to an update-in-place. No pre-check, so there is no race
    /// window between check and write.
    async fn upsert_seller(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        seller: &SellerDetail,
    ) -> Result<()> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO sellers
            (seller_id, seller_name, keyword, business_name, address, tax_id,
             tax_id_status, completeness, feedback_1m, feedback_3m, feedback_12m,
             feedback_lifetime, app_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&seller.seller_id)
        .bind(&seller.seller_name)
        .bind(&seller.keyword)
        .bind(&seller.business_name)
        .bind(&seller.address)
        .bind(&seller.tax_id)
        .bind(seller.tax_id_status.code())
        .bind(seller.completeness.code())
        .bind(seller.feedback.one_month)
        .bind(seller.feedback.three_month)
        .bind(seller.feedback.twelve_month)
        .bind(seller.feedback.lifetime)
        .bind(self.app_id)
        .execute(&mut **tx)
        .await;

        match inserted {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                sqlx::query(
                    r#"
                    UPDATE sellers SET
                        seller_name = ?, business_name = ?, address = ?, tax_id = ?,
                        tax_id_status = ?, completeness = ?, app_id = ?,
                        feedback_1m = ?, feedback_3m = ?, feedback_12m = ?,
                        feedback_lifetime = ?, updated_at = CURRENT_TIMESTAMP
                    WHERE seller_id = ?
                    "#,
                )
                .bind(&seller.seller_name)
                .bind(&seller.business_name)
                .bind(&seller.address)
                .bind(&seller.tax_id)
                .bind(seller.tax_id_status.code())
                .bind(seller.completeness.code())
                .bind(self.app_id)
                .bind(seller.feedback.one_month)
                .bind(seller.feedback.three_month)
                .bind(seller.feedback.twelve_month)
                .bind(seller.feedback.lifetime)
                .bind(&seller.seller_id)
                .execute(&mut **tx)
                .await
                .context("Failed to update existing seller")?;
                Ok(())
            }
            Err(err) => Err(err).context("Failed to insert seller"),
        }
    }

    /// Upsert into the denormalized shop profile view. The key differs from
    /// the seller table, so this uses an explicit existence check.
    async fn upsert_shop_profile(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        seller: &SellerDetail,
    ) -> Result<()> {
        let domain = seller.keyword.to_lowercase();
        let shop_url = format!(
            "https://{}/sp?ie=UTF8&seller={}",
            self.marketplace_host, seller.seller_id
        );

        let existing = sqlx::query("SELECT id FROM shop_profiles WHERE domain = ? AND seller_id = ?")
            .bind(&domain)
            .bind(&seller.seller_id)
            .fetch_optional(&mut **tx)
            .await
            .context("Failed to query shop profile")?;

        match existing {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO shop_profiles
                    (domain, seller_id, shop_name, shop_url, marketplace, business_name,
                     address, feedback_1m, feedback_3m, feedback_12m, feedback_lifetime,
                     crawled_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
                    "#,
                )
                .bind(&domain)
                .bind(&seller.seller_id)
                .bind(&seller.seller_name)
                .bind(&shop_url)
                .bind(&self.marketplace)
                .bind(&seller.business_name)
                .bind(&seller.address)
                .bind(seller.feedback.one_month)
                .bind(seller.feedback.three_month)
                .bind(seller.feedback.twelve_month)
                .bind(seller.feedback.lifetime)
                .execute(&mut **tx)
                .await
                .context("Failed to insert shop profile")?;
            }
            Some(row) => {
                let id: i64 = row.get("id");
                sqlx::query(
                    r#"
                    UPDATE shop_profiles SET
                        shop_name = ?, shop_url = ?, business_name = ?, address = ?,
                        feedback_1m = ?, feedback_3m = ?, feedback_12m = ?,
                        feedback_lifetime = ?, crawled_at = CURRENT_TIMESTAMP,
                        updated_at = CURRENT_TIMESTAMP
                    WHERE id = ?
                    "#,
                )
                .bind(&seller.seller_name)
                .bind(&shop_url)
                .bind(&seller.business_name)
                .bind(&seller.address)
                .bind(seller.feedback.one_month)
                .bind(seller.feedback.three_month)
                .bind(seller.feedback.twelve_month)
                .bind(seller.feedback.lifetime)
                .bind(id)
                .execute(&mut **tx)
                .await
                .context("Failed to update shop profile")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::classify::{classify_completeness, classify_tax_id};
    use crate::domain::entities::{FeedbackCounts, ProductStatus};
    use crate::infrastructure::database_connection::DatabaseConnection;
    use crate::infrastructure::task_repository::TaskRepository;
    use tempfile::tempdir;

    fn product(asin: &str, keyword: &str) -> ProductRecord {
        ProductRecord {
            url: format!("/dp/{asin}"),
            param: "/ref=sr_1_1".to_string(),
            title: format!("Product {asin}"),
            asin: asin.to_string(),
            keyword: keyword.to_string(),
            bought_count: "500".to_string(),
            price: "19.99".to_string(),
            rating: "4.5".to_string(),
            review_count: "1,024".to_string(),
            status: ProductStatus::Done,
            seller_id: None,
            brand_name: None,
            brand_store_url: None,
        }
    }

    fn seller(seller_id: &str, keyword: &str, business_name: &str) -> SellerDetail {
        let tax_id = "911234567890123456";
        SellerDetail {
            seller_id: seller_id.to_string(),
            seller_name: "Acme Storefront".to_string(),
            keyword: keyword.to_string(),
            business_name: business_name.to_string(),
            address: "1 Main St Springfield".to_string(),
            tax_id: tax_id.to_string(),
            tax_id_status: classify_tax_id(tax_id),
            completeness: classify_completeness(business_name, "1 Main St Springfield", tax_id),
            feedback: FeedbackCounts {
                one_month: 10,
                three_month: 25,
                twelve_month: 80,
                lifetime: 410,
            },
        }
    }

    async fn setup(dir: &tempfile::TempDir) -> (SqlitePool, BatchPersistence, i64) {
        let url = format!("sqlite:{}", dir.path().join("batch.db").display());
        let db = DatabaseConnection::new(&url, 5).await.unwrap();
        db.migrate().await.unwrap();
        let pool = db.pool().clone();

        let tasks = TaskRepository::new(pool.clone());
        tasks.submit("acme tools").await.unwrap();
        let task = tasks.next_pending().await.unwrap().unwrap();

        let batch = BatchPersistence::new(pool.clone(), 1, "market.test", "US");
        (pool, batch, task.id)
    }

    #[tokio::test]
    async fn repeated_product_insert_is_a_no_op() {
        let dir = tempdir().unwrap();
        let (_pool, batch, task_id) = setup(&dir).await;

        let products = vec![product("B000AAAA01", "acme tools")];
        let first = batch
            .save_task_results(task_id, "acme tools", &products, &[])
            .await
            .unwrap();
        assert_eq!(first.products, 1);

        let second = batch
            .save_task_results(task_id, "acme tools", &products, &[])
            .await
            .unwrap();
        assert_eq!(second.products, 0, "conflict-ignore must add zero rows");
    }

    #[tokio::test]
    async fn seller_upsert_updates_in_place_on_conflict() {
        let dir = tempdir().unwrap();
        let (pool, batch, task_id) = setup(&dir).await;

        batch
            .save_task_results(task_id, "acme tools", &[], &[seller("A1B2", "acme tools", "Acme Ltd")])
            .await
            .unwrap();
        batch
            .save_task_results(task_id, "acme tools", &[], &[seller("A1B2", "acme tools", "Acme Holdings")])
            .await
            .unwrap();

        let rows = sqlx::query("SELECT business_name FROM sellers WHERE seller_id = 'A1B2'")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get::<String, _>("business_name"), "Acme Holdings");

        let shops = sqlx::query("SELECT COUNT(*) AS n FROM shop_profiles")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(shops.get::<i64, _>("n"), 1);
    }

    #[tokio::test]
    async fn task_is_marked_completed_inside_the_batch() {
        let dir = tempdir().unwrap();
        let (pool, batch, task_id) = setup(&dir).await;

        batch
            .save_task_results(task_id, "acme tools", &[product("B000AAAA02", "acme tools")], &[])
            .await
            .unwrap();

        let row = sqlx::query("SELECT status FROM keyword_tasks WHERE id = ?")
            .bind(task_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>("status"), "Completed");
    }
}
