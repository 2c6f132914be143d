// =============================================================================
// Tickscope — Main Entry Point
// =============================================================================
//
// Wires the engine to a Deriv-style tick feed and the subscriber API, then
// runs until Ctrl+C. The feed reconnects on its own; nothing here is fatal
// after startup except the API listener failing to bind.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tickscope::api;
use tickscope::app_state::AppState;
use tickscope::market_data::{run_feed_loop, FixedDelay};
use tickscope::runtime_config::{LayeredConfig, RuntimeConfig};

const CONFIG_PATH: &str = "tickscope_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Tickscope starting up");

    let file_config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    let layers = LayeredConfig::from_env(file_config);
    let config = layers.effective.clone();
    config.validate().context("invalid runtime configuration")?;

    info!(
        symbols = ?config.symbols,
        buffer_capacity = config.buffer_capacity,
        cooldown_ms = config.cooldown_ms,
        authorize = config.feed.api_token.is_some(),
        subscriber_auth = config.subscriber_token.is_some(),
        "Configuration ready"
    );

    let feed_config = config.feed.clone();
    let symbols = config.symbols.clone();
    let bind_addr = config.bind_addr.clone();

    // ── 2. Build shared state ────────────────────────────────────────────
    let state = Arc::new(AppState::new(config)?);

    // ── 3. Tick feed ─────────────────────────────────────────────────────
    let retry = Box::new(FixedDelay::new(Duration::from_secs(
        feed_config.reconnect_delay_secs,
    )));
    tokio::spawn(run_feed_loop(feed_config, symbols, state.clone(), retry));

    // ── 4. API server ────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    let app = api::rest::router(state.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping");

    // Env overrides stay out of the file.
    if let Err(e) = layers.save(CONFIG_PATH) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    let health = state.health();
    info!(
        ticks = health.ticks_ingested,
        signals = health.signals_emitted,
        malformed = health.malformed_messages,
        "Tickscope shut down complete"
    );
    Ok(())
}
