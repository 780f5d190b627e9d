//! ServiceDesk - service request lifecycle engine
//!
//! Loads configuration, opens the database, runs migrations and keeps the
//! escalation scheduler running until Ctrl-C.

use anyhow::Context as _;
use servicedesk_infra::config;
use servicedesk_lib::utils::logging::init_tracing;
use servicedesk_lib::AppContext;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before configuration so SERVICEDESK_* variables apply
    let dotenv = dotenvy::dotenv();

    let config = config::load().context("failed to load configuration")?;
    init_tracing(&config.logging).context("failed to initialize logging")?;

    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(e) => info!(reason = %e, "no .env loaded"),
    }

    info!(version = env!("CARGO_PKG_VERSION"), "ServiceDesk starting");

    let ctx = AppContext::new_with_config(config)
        .await
        .context("failed to initialize application context")?;

    let scheduled = ctx.start_scheduler().await.context("failed to start escalation scheduler")?;
    let health = ctx.health_check().await;
    info!(
        escalation_scheduler = scheduled,
        healthy = health.is_healthy,
        score = health.score,
        "ServiceDesk ready"
    );

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    if let Err(e) = ctx.shutdown().await {
        warn!(error = %e, "shutdown did not complete cleanly");
    }
    Ok(())
}
