/// Eventide - multi-user event management server
///
/// Users own calendar events, share them with per-event roles, and can
/// inspect, diff and roll back every version an event has gone through.

mod account;
mod api;
mod auth;
mod clock;
mod collaboration;
mod config;
mod context;
mod db;
mod error;
mod events;
mod jobs;
mod permissions;
mod rate_limit;
mod server;

use config::ServerConfig;
use context::AppContext;
use error::AppResult;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration (also reads .env, which may set RUST_LOG)
    let config = ServerConfig::from_env()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.logging.level)
                .unwrap_or_else(|_| config::DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = %config.service.version, "Starting Eventide");

    // Create application context
    let ctx = Arc::new(AppContext::new(config).await?);

    // Start background jobs
    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    // Start server
    server::serve((*ctx).clone()).await?;

    Ok(())
}
