//! Session cookie pool shared across crawl hosts
//!
//! The pool lives in the `cookies` table. Each host claims at most one
//! Active cookie; claiming is a single conditional UPDATE so that two
//! hosts can never bind the same row, even from separate processes.
//! Invalidation clears the binding and returns nothing to the pool owner:
//! recovery is always invalidate-then-acquire.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

use crate::domain::entities::CookieStatus;
use crate::domain::error::{CrawlError, CrawlResult};

/// A cookie currently bound to this host.
#[derive(Debug, Clone)]
pub struct BoundCookie {
    pub id: i64,
    pub value: String,
}

/// Manager for the shared cookie pool.
pub struct CookiePool {
    pool: SqlitePool,
    host_id: i64,
    current: Mutex<Option<BoundCookie>>,
}

impl CookiePool {
    pub fn new(pool: SqlitePool, host_id: i64) -> Self {
        Self {
            pool,
            host_id,
            current: Mutex::new(None),
        }
    }

    pub fn host_id(&self) -> i64 {
        self.host_id
    }

    /// The cookie this process believes it holds, without touching the
    /// database.
    pub fn current(&self) -> Option<BoundCookie> {
        self.current.lock().ok().and_then(|guard| guard.clone())
    }

    /// Return the cookie bound to this host, claiming an unbound Active
    /// one when the host owns none.
    pub async fn acquire(&self) -> CrawlResult<BoundCookie> {
        if let Some(cookie) = self.current() {
            return Ok(cookie);
        }

        if let Some(cookie) = self.find_bound().await? {
            self.remember(&cookie);
            return Ok(cookie);
        }

        self.claim_unbound().await
    }

    /// Mark a cookie Invalid and release its binding. Idempotent and
    /// best-effort: failures are logged, never raised to the caller.
    pub async fn invalidate(&self, cookie_id: i64) {
        let result = sqlx::query("UPDATE cookies SET status = ?, host_id = NULL WHERE id = ?")
            .bind(CookieStatus::Invalid.as_str())
            .bind(cookie_id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => warn!("Cookie {} marked invalid and released", cookie_id),
            Err(err) => warn!("Failed to invalidate cookie {}: {}", cookie_id, err),
        }

        if let Ok(mut guard) = self.current.lock() {
            if guard.as_ref().is_some_and(|c| c.id == cookie_id) {
                *guard = None;
            }
        }
    }

    /// Standard recovery path for a verification/CAPTCHA response:
    /// invalidate whatever this host holds, then claim a fresh cookie.
    pub async fn handle_invalid_response(&self) -> CrawlResult<BoundCookie> {
        let held = match self.current() {
            Some(cookie) => Some(cookie),
            None => self.find_bound().await?,
        };

        if let Some(cookie) = held {
            self.invalidate(cookie.id).await;
        }

        self.acquire().await
    }

    async fn find_bound(&self) -> CrawlResult<Option<BoundCookie>> {
        let row = sqlx::query("SELECT id, cookie FROM cookies WHERE host_id = ? AND status = ? LIMIT 1")
            .bind(self.host_id)
            .bind(CookieStatus::Active.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| BoundCookie {
            id: row.get("id"),
            value: row.get::<String, _>("cookie").trim().to_string(),
        }))
    }

    /// Claim one unbound Active cookie with a single conditional UPDATE.
    /// The statement is atomic, so concurrent claimants each receive a
    /// distinct row or none.
    async fn claim_unbound(&self) -> CrawlResult<BoundCookie> {
        if let Ok(mut guard) = self.current.lock() {
            *guard = None;
        }

        let row = sqlx::query(
            r#"
            UPDATE cookies SET host_id = ?
            WHERE id = (
                SELECT id FROM cookies
                WHERE host_id IS NULL AND status = ?
                ORDER BY id LIMIT 1
            ) AND host_id IS NULL
            RETURNING id, cookie
            "#,
        )
        .bind(self.host_id)
        .bind(CookieStatus::Active.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(CrawlError::NoCookieAvailable);
        };

        let cookie = BoundCookie {
            id: row.get("id"),
            value: row.get::<String, _>("cookie").trim().to_string(),
        };
        info!("Claimed cookie {} for host {}", cookie.id, self.host_id);
        self.remember(&cookie);
        Ok(cookie)
    }

    fn remember(&self, cookie: &BoundCookie) {
        if let Ok(mut guard) = self.current.lock() {
            *guard = Some(cookie.clone());
        }
    }
}

// ===============================
// FILE-BASED COOKIE IMPORT
// ===============================

/// One entry of the JSON cookie exchange format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieFileEntry {
    pub zipcode: String,
    pub city: String,
    pub cookie: String,
    pub created_at: DateTime<Utc>,
}

/// The JSON cookie exchange document: `{"cookies": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieFile {
    pub cookies: Vec<CookieFileEntry>,
}

/// Load cookies from the JSON exchange format.
pub fn load_cookie_file(path: &Path) -> Result<Vec<CookieFileEntry>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read cookie file {}", path.display()))?;
    let file: CookieFile = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse cookie file {}", path.display()))?;
    if file.cookies.is_empty() {
        anyhow::bail!("Cookie file {} is empty", path.display());
    }
    info!("Loaded {} cookies from {}", file.cookies.len(), path.display());
    Ok(file.cookies)
}

/// Save cookies to the JSON exchange format.
pub fn save_cookie_file(path: &Path, cookies: &[CookieFileEntry]) -> Result<()> {
    let file = CookieFile {
        cookies: cookies.to_vec(),
    };
    let data = serde_json::to_string_pretty(&file)?;
    std::fs::write(path, data)
        .with_context(|| format!("Failed to write cookie file {}", path.display()))?;
    Ok(())
}

/// Import file-based cookies into the pool table as unbound Active
/// entries. Returns the number of rows inserted.
pub async fn import_cookies(pool: &SqlitePool, entries: &[CookieFileEntry]) -> Result<usize> {
    let mut inserted = 0;
    for entry in entries {
        sqlx::query(
            "INSERT INTO cookies (cookie, zipcode, city, status, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&entry.cookie)
        .bind(&entry.zipcode)
        .bind(&entry.city)
        .bind(CookieStatus::Active.as_str())
        .bind(entry.created_at)
        .execute(pool)
        .await?;
        inserted += 1;
    }
    info!("Imported {} cookies into the pool", inserted);
    Ok(inserted)
}

/// US zipcode pool used when generating fresh session identities.
pub const US_ZIP_CODES: &[(&str, &str)] = &[
    ("10001", "New York, NY"),
    ("10013", "Manhattan, NY"),
    ("90001", "Los Angeles, CA"),
    ("90210", "Beverly Hills, CA"),
    ("60601", "Chicago, IL"),
    ("60611", "Chicago Downtown, IL"),
    ("77001", "Houston, TX"),
    ("77002", "Houston Downtown, TX"),
    ("85001", "Phoenix, AZ"),
    ("19101", "Philadelphia, PA"),
    ("78201", "San Antonio, TX"),
    ("92101", "San Diego, CA"),
    ("75201", "Dallas, TX"),
    ("95101", "San Jose, CA"),
    ("78701", "Austin, TX"),
    ("32801", "Orlando, FL"),
    ("33101", "Miami, FL"),
    ("98101", "Seattle, WA"),
    ("80201", "Denver, CO"),
    ("02101", "Boston, MA"),
];

/// Pick a random zipcode/city pair from the pool.
pub fn random_zipcode() -> (&'static str, &'static str) {
    US_ZIP_CODES[fastrand::usize(..US_ZIP_CODES.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database_connection::DatabaseConnection;
    use std::sync::Arc;
    use tempfile::tempdir;

    async fn test_pool(dir: &tempfile::TempDir, name: &str) -> SqlitePool {
        let url = format!("sqlite:{}", dir.path().join(name).display());
        let db = DatabaseConnection::new(&url, 5).await.unwrap();
        db.migrate().await.unwrap();
        db.pool().clone()
    }

    async fn seed_cookie(pool: &SqlitePool, value: &str) -> i64 {
        let result = sqlx::query("INSERT INTO cookies (cookie, status) VALUES (?, 'Active')")
            .bind(value)
            .execute(pool)
            .await
            .unwrap();
        result.last_insert_rowid()
    }

    #[tokio::test]
    async fn acquire_returns_existing_binding_before_claiming() {
        let dir = tempdir().unwrap();
        let pool = test_pool(&dir, "bind.db").await;
        seed_cookie(&pool, "session-a").await;
        seed_cookie(&pool, "session-b").await;

        let cookies = CookiePool::new(pool, 1);
        let first = cookies.acquire().await.unwrap();
        let second = cookies.acquire().await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn concurrent_hosts_never_share_a_cookie() {
        let dir = tempdir().unwrap();
        let pool = test_pool(&dir, "race.db").await;
        for i in 0..4 {
            seed_cookie(&pool, &format!("session-{i}")).await;
        }

        let mut handles = Vec::new();
        for host_id in 1..=4 {
            let manager = Arc::new(CookiePool::new(pool.clone(), host_id));
            handles.push(tokio::spawn(async move { manager.acquire().await.unwrap().id }));
        }

        let mut claimed = Vec::new();
        for handle in handles {
            claimed.push(handle.await.unwrap());
        }
        claimed.sort_unstable();
        claimed.dedup();
        assert_eq!(claimed.len(), 4, "two hosts claimed the same cookie");
    }

    #[tokio::test]
    async fn invalidate_then_acquire_never_returns_the_dead_cookie() {
        let dir = tempdir().unwrap();
        let pool = test_pool(&dir, "recover.db").await;
        seed_cookie(&pool, "stale").await;
        seed_cookie(&pool, "fresh").await;

        let cookies = CookiePool::new(pool.clone(), 7);
        let stale = cookies.acquire().await.unwrap();

        let fresh = cookies.handle_invalid_response().await.unwrap();
        assert_ne!(stale.id, fresh.id);

        let row = sqlx::query("SELECT status, host_id FROM cookies WHERE id = ?")
            .bind(stale.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>("status"), "Invalid");
        assert!(row.get::<Option<i64>, _>("host_id").is_none());

        // no host may claim the invalidated cookie again
        let other = CookiePool::new(pool.clone(), 8);
        let claimed = other.acquire().await.unwrap();
        assert_ne!(claimed.id, stale.id);
    }

    #[tokio::test]
    async fn empty_pool_reports_no_cookie_available() {
        let dir = tempdir().unwrap();
        let pool = test_pool(&dir, "empty.db").await;

        let cookies = CookiePool::new(pool, 1);
        let err = cookies.acquire().await.unwrap_err();
        assert!(matches!(err, CrawlError::NoCookieAvailable));
        assert!(cookies.current().is_none());
    }

    #[tokio::test]
    async fn cookie_file_round_trip_and_import() {
        let dir = tempdir().unwrap();
        let pool = test_pool(&dir, "import.db").await;
        let path = dir.path().join("cookies.json");

        let (zipcode, city) = random_zipcode();
        let entries = vec![CookieFileEntry {
            zipcode: zipcode.to_string(),
            city: city.to_string(),
            cookie: "session-token=abc123".to_string(),
            created_at: Utc::now(),
        }];

        save_cookie_file(&path, &entries).unwrap();
        let loaded = load_cookie_file(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].cookie, "session-token=abc123");

        let imported = import_cookies(&pool, &loaded).await.unwrap();
        assert_eq!(imported, 1);

        let cookies = CookiePool::new(pool, 2);
        let bound = cookies.acquire().await.unwrap();
        assert_eq!(bound.value, "session-token=abc123");
    }
}
