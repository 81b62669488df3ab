use crate::config::parse::{load_config, ConfigError};
use crate::sink::TracingSink;
use crate::tail::{LogTailer, TailError};
use crate::transport::WebSocketTransport;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("log tail error: {0}")]
    Tail(#[from] TailError),
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub reference_id: Option<String>,
    pub tail_from: Option<Duration>,
}

pub async fn run(
    config_path: Option<PathBuf>,
    overrides: RunOverrides,
) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match config_path {
        Some(path) => path,
        None => {
            eprintln!("Error: config not found");
            eprintln!("Searched locations:");
            eprintln!("  ~/.config/logtail/config.yml");
            eprintln!("  /etc/logtail/config.yml");
            eprintln!("\nUse --config <path> to specify a config file, or run 'logtail config init' to generate one.");
            std::process::exit(1);
        }
    };

    run_tail(&config_path, overrides).await.map_err(|e| e.into())
}

async fn run_tail(config_path: &Path, overrides: RunOverrides) -> Result<(), RunError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    let mut config = load_config(config_path)?;

    if let Some(reference_id) = overrides.reference_id {
        config.tail.reference_id = reference_id;
    }
    if let Some(tail_from) = overrides.tail_from {
        config.tail.tail_from = tail_from;
    }

    let tailer = LogTailer::new(config.tail_config(), Arc::new(WebSocketTransport::new()));

    // Cancelled on Ctrl+C
    let cancel = CancellationToken::new();
    let shutdown = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                cancel.cancel();
            }
        }
    });

    info!(
        reference_id = %config.tail.reference_id,
        tail_from = ?config.tail.tail_from,
        "Starting log tail, press Ctrl+C to stop"
    );

    let result = tailer
        .stream_logs(
            cancel,
            Arc::new(TracingSink),
            &config.tail.reference_id,
            config.tail.tail_from,
        )
        .await;
    shutdown.abort();

    match result {
        Ok(()) => {
            info!("Log tail shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Log tail failed");
            Err(e.into())
        }
    }
}
