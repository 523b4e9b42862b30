//! Infrastructure layer
//!
//! Concrete implementations behind the domain seams: configuration,
//! logging, database access, the HTTP transport, robots compliance, the
//! cookie pool, repositories, and the HTML parsers.

pub mod batch_persistence;
pub mod config;
pub mod cookie_pool;
pub mod database_connection;
pub mod http_client;
pub mod logging;
pub mod parsing;
pub mod product_repository;
pub mod robots;
pub mod run_repository;
pub mod task_repository;

pub use batch_persistence::{BatchPersistence, BatchReport};
pub use config::AppConfig;
pub use cookie_pool::CookiePool;
pub use database_connection::DatabaseConnection;
pub use http_client::HttpClient;
pub use product_repository::ProductRepository;
pub use robots::{load_robots_gate, RobotsGate, RobotsRules};
pub use run_repository::RunRepository;
pub use task_repository::TaskRepository;
