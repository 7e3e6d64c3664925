pub mod automation;
pub mod bridge;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod state;

use anyhow::Context;
use automation::AutomationServer;
use config::AppConfig;
use state::AppState;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber. `RUST_LOG` overrides the default filter; an
/// already-installed subscriber is left in place.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("crebass=info,crebass_lib=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Load the configuration and drive the browser until it quits.
pub async fn run(server: Arc<dyn AutomationServer>) -> anyhow::Result<()> {
    init_tracing();

    // Never overwrite an existing file on failure
    let config = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(
                "Failed to load config: {}. Using in-memory defaults (not saving).",
                e
            );
            AppConfig::default()
        }
    };

    run_with_config(server, config).await
}

pub async fn run_with_config(
    server: Arc<dyn AutomationServer>,
    config: AppConfig,
) -> anyhow::Result<()> {
    let state = AppState::launch(server, config).context("failed to launch browser")?;
    state
        .open_start_url()
        .await
        .context("failed to open start URL")?;

    state.wait_closed().await;
    tracing::info!("Browser closed, shutting down");
    Ok(())
}
