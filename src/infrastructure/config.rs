//! Configuration infrastructure
//!
//! Configuration is loaded from an optional TOML file layered over struct
//! defaults, with `SELLER_SCOUT__*` environment variables taking precedence
//! over both. Every component receives its slice of the config through the
//! application context; there is no process-global configuration handle.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Process and marketplace identity.
    pub basic: BasicConfig,

    /// Database connection settings.
    pub database: DatabaseConfig,

    /// Crawl behaviour: transport, pacing, retry cooldowns.
    pub crawler: CrawlerConfig,

    /// HTTP surface settings.
    pub server: ServerConfig,
}

/// Process and marketplace identity settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicConfig {
    /// Application identifier recorded on every row this process writes.
    pub app_id: i64,

    /// Host identifier used for cookie pool binding. Multiple processes on
    /// one machine should share it; distinct machines must not.
    pub host_id: i64,

    /// Marketplace host, e.g. `www.example-market.com`.
    pub domain: String,

    /// Marketplace region code stored on shop profiles.
    pub marketplace: String,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            app_id: 1,
            host_id: 1,
            domain: "www.amazon.com".to_string(),
            marketplace: "US".to_string(),
        }
    }
}

/// Database connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite URL, e.g. `sqlite:data/seller_scout.db`.
    pub url: String,

    /// Connection pool size.
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:data/seller_scout.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Crawl behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User agent presented to the marketplace and to the robots gate.
    pub user_agent: String,

    /// Request timeout in seconds.
    pub timeout_seconds: u64,

    /// Outbound request ceiling per second.
    pub max_requests_per_second: u32,

    /// Whether to load and honor robots.txt at startup.
    pub respect_robots_txt: bool,

    /// Cooldown before retrying a 404/503 search fetch, in milliseconds.
    pub search_cooldown_ms: u64,

    /// Cooldown before retrying a 404/503 product or seller fetch, in
    /// milliseconds.
    pub entity_cooldown_ms: u64,

    /// Safety-net wake interval for the task worker, in seconds.
    pub worker_poll_seconds: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 ",
                "(KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36"
            )
            .to_string(),
            timeout_seconds: 30,
            max_requests_per_second: 7,
            respect_robots_txt: true,
            search_cooldown_ms: 120_000,
            entity_cooldown_ms: 300_000,
            worker_poll_seconds: 10,
        }
    }
}

/// HTTP surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address for the task submission API.
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`, layering file and environment
    /// sources over the defaults. A missing file is not an error.
    pub fn load(path: &Path) -> Result<Self> {
        let defaults = config::Config::try_from(&AppConfig::default())
            .context("Failed to build default configuration")?;

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix("SELLER_SCOUT").separator("__"))
            .build()
            .context("Failed to assemble configuration sources")?;

        let app_config: AppConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        info!(
            "Configuration loaded: app_id={} host_id={} domain={}",
            app_config.basic.app_id, app_config.basic.host_id, app_config.basic.domain
        );
        Ok(app_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_when_file_is_missing() {
        let config = AppConfig::load(Path::new("does-not-exist.toml")).unwrap();
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.crawler.max_requests_per_second, 7);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[basic]\napp_id = 7\nhost_id = 3\ndomain = \"market.test\"\nmarketplace = \"US\""
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.basic.app_id, 7);
        assert_eq!(config.basic.host_id, 3);
        assert_eq!(config.basic.domain, "market.test");
        // untouched sections keep their defaults
        assert_eq!(config.server.listen_addr, "127.0.0.1:8080");
    }
}
