//! Application context
//!
//! The explicitly constructed handle bundle passed to every component at
//! construction time. Owned by the process bootstrap; nothing in the crate
//! reaches for a process-global.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::domain::services::{ComplianceGate, PageFetcher};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::cookie_pool::CookiePool;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub db: SqlitePool,
    pub fetcher: Arc<dyn PageFetcher>,
    pub gate: Arc<dyn ComplianceGate>,
    pub cookies: Arc<CookiePool>,
}

impl AppContext {
    pub fn app_id(&self) -> i64 {
        self.config.basic.app_id
    }

    pub fn domain(&self) -> &str {
        &self.config.basic.domain
    }

    pub fn user_agent(&self) -> &str {
        &self.config.crawler.user_agent
    }
}
