//! Seller Scout - Marketplace Seller Discovery Crawler
//!
//! Crawls an e-commerce marketplace to discover the sellers and brand
//! owners behind keyword-matched products. A durable three-stage pipeline
//! (search, product, seller) runs off a database-backed task queue, with a
//! rotating session cookie pool shared across hosts and atomic multi-table
//! persistence per keyword run.

// Module declarations
pub mod api;
pub mod application;
pub mod domain;
pub mod infrastructure;
