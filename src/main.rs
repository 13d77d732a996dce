mod client;
mod config;
mod failover;
mod health;
mod monitor;
mod protocol;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use config::{FileProvider, MonitorConfig};
use failover::FailoverController;
use health::HealthChecker;
use monitor::MonitorLoop;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config_path = locate_config();
    let settings = load_monitor_settings(&config_path);

    // Endpoints are re-read from the file on every tick; only the
    // loop settings are fixed at startup
    let provider = Arc::new(FileProvider::new(&config_path));
    let checker = Arc::new(HealthChecker::new(&settings));
    let controller = Arc::new(FailoverController::new(&settings));
    let monitor = MonitorLoop::new(provider, checker, controller, &settings);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            shutdown.cancel();
        });
    }

    let state = monitor.run(shutdown).await;
    info!(ticks = state.tick_count, "Exited");
    Ok(())
}

/// Find the config file: first CLI argument, or the default locations
fn locate_config() -> PathBuf {
    if let Some(arg) = std::env::args().nth(1) {
        return PathBuf::from(arg);
    }

    let candidates = ["config/pgvigil.toml", "pgvigil.toml"];
    for path in candidates {
        if std::path::Path::new(path).exists() {
            return PathBuf::from(path);
        }
    }

    // Missing file is not fatal: the provider reports it every tick
    // and the loop treats the primary as dead, which is the documented
    // missing-configuration behavior
    warn!(path = candidates[1], "No config file found");
    PathBuf::from(candidates[1])
}

fn load_monitor_settings(path: &Path) -> MonitorConfig {
    match config::load_config(path) {
        Ok(config) => {
            info!(path = %path.display(), "Loaded configuration");
            config.monitor
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
            MonitorConfig::default()
        }
    }
}

/// Resolve when the host asks us to stop (ctrl-c or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
