// Net Worth Tracker - Web Server
// REST API with Axum

use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use std::path::PathBuf;
use tower_http::cors::CorsLayer;

use networth_tracker::api::{router, AppState};
use networth_tracker::{Config, SqliteRepository};

/// Serve the net worth REST API
#[derive(Parser, Debug)]
struct Args {
    /// JSON config file
    #[clap(long)]
    config: Option<PathBuf>,

    /// SQLite database (overrides config and NETWORTH_DB)
    #[clap(long)]
    db: Option<PathBuf>,

    /// Listen address (overrides config and NETWORTH_ADDR)
    #[clap(long)]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(db) = args.db {
        config.database_path = db;
    }
    if let Some(addr) = args.addr {
        config.server_addr = addr;
    }

    let repo = SqliteRepository::open(&config.database_path)?.with_actor("api");
    log::info!("Database opened: {}", config.database_path.display());

    let state = AppState::new(repo).with_defaults(config.default_period, config.default_range);

    let app = Router::new()
        .nest("/api", router(state))
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server_addr))?;

    log::info!("Server running on http://{}", config.server_addr);
    println!("🚀 Server running on http://{}", config.server_addr);
    println!("   API: http://{}/api/summary", config.server_addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
