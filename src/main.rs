//! Process bootstrap
//!
//! Wires configuration, storage, the robots gate, the cookie pool, the
//! task worker, and the HTTP surface together, then runs until a shutdown
//! signal. Unavailable persistent storage is the only fatal startup error;
//! everything else degrades with a warning.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use seller_scout::api;
use seller_scout::application::stages::{ProductStage, SellerStage};
use seller_scout::application::{AppContext, TaskSubmissionService, TaskWorker};
use seller_scout::domain::services::{AllowAllGate, ComplianceGate};
use seller_scout::infrastructure::cookie_pool::{import_cookies, load_cookie_file, CookiePool};
use seller_scout::infrastructure::logging::init_logging;
use seller_scout::infrastructure::robots::load_robots_gate;
use seller_scout::infrastructure::{
    AppConfig, BatchPersistence, DatabaseConnection, HttpClient, ProductRepository, RunRepository,
    TaskRepository,
};

#[derive(Parser, Debug)]
#[command(name = "seller-scout", about = "Marketplace seller discovery crawler")]
struct Args {
    /// Path to the configuration file
    #[arg(short = 'c', long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the API listen address from the configuration
    #[arg(long)]
    serve: Option<String>,

    /// Import a JSON cookie file into the pool, then exit
    #[arg(long)]
    import_cookies: Option<PathBuf>,

    /// Recheck stored product rows for one keyword, then exit
    #[arg(long, value_name = "KEYWORD")]
    recheck: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging("info")?;

    let config = AppConfig::load(&args.config)?;

    // Storage is the one fatal dependency at startup.
    let db = DatabaseConnection::new(&config.database.url, config.database.max_connections)
        .await
        .context("Persistent storage unavailable")?;
    db.migrate().await.context("Schema migration failed")?;
    let pool = db.pool().clone();

    if let Some(path) = args.import_cookies {
        let entries = load_cookie_file(&path)?;
        let imported = import_cookies(&pool, &entries).await?;
        info!("Imported {imported} cookies, exiting");
        return Ok(());
    }

    let config = Arc::new(config);
    let cookies = Arc::new(CookiePool::new(pool.clone(), config.basic.host_id));

    let gate: Arc<dyn ComplianceGate> = if config.crawler.respect_robots_txt {
        let bootstrap_client = HttpClient::new(config.crawler.clone())?;
        Arc::new(load_robots_gate(&bootstrap_client, &config.basic.domain).await?)
    } else {
        warn!("robots.txt checking disabled by configuration");
        Arc::new(AllowAllGate)
    };

    let fetcher = Arc::new(HttpClient::new(config.crawler.clone())?.with_cookie_pool(cookies.clone()));

    let ctx = AppContext {
        config: config.clone(),
        db: pool.clone(),
        fetcher,
        gate,
        cookies,
    };

    if let Some(keyword) = args.recheck {
        return recheck_keyword(&ctx, &keyword).await;
    }

    let runs = RunRepository::new(pool.clone());
    let app_run_id = runs.start_app_run(config.basic.app_id).await?;

    let cancel = CancellationToken::new();
    let (worker, notifier) = TaskWorker::new(ctx, cancel.clone())?;
    let worker_handle = tokio::spawn(worker.run());

    let service = Arc::new(TaskSubmissionService::new(
        TaskRepository::new(pool.clone()),
        notifier,
    ));

    let listen_addr = args
        .serve
        .unwrap_or_else(|| config.server.listen_addr.clone());
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("Failed to bind {listen_addr}"))?;
    info!("HTTP surface listening on {listen_addr}");
    info!("  POST /api/crawl  - submit keywords");
    info!("  GET  /api/status - task counts by status");
    info!("  GET  /health     - health probe");

    axum::serve(listener, api::router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP surface failed")?;

    // Let the in-flight task finish; cancellation is honored between tasks.
    info!("Shutting down");
    cancel.cancel();
    if let Err(err) = worker_handle.await {
        warn!("Worker terminated abnormally: {err}");
    }
    if let Err(err) = runs.finish_app_run(app_run_id).await {
        warn!("Failed to close application run: {err}");
    }
    info!("Shutdown complete");
    Ok(())
}

/// Batch mode: re-run the product stage over stored rows of one keyword,
/// then enrich and persist whatever sellers it surfaces.
async fn recheck_keyword(ctx: &AppContext, keyword: &str) -> Result<()> {
    let products = ProductRepository::new(ctx.db.clone());
    let product_stage = ProductStage::new()?;
    let discovered = product_stage.recheck_stored(ctx, &products, keyword).await?;

    if discovered.is_empty() {
        info!("Recheck of '{keyword}' surfaced no sellers");
        return Ok(());
    }

    let details = SellerStage::new()?.run(ctx, discovered).await;
    let batch = BatchPersistence::new(
        ctx.db.clone(),
        ctx.app_id(),
        ctx.domain(),
        &ctx.config.basic.marketplace,
    );
    let report = batch.save_sellers(&details).await?;
    info!(
        "Recheck of '{keyword}' done: sellers={} shops={}",
        report.sellers, report.shops
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
