use anyhow::{Context, Result};
use locator_service::services::cancel_pair;
use locator_service::{Config, InMemoryStore, Locator};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(&config.log_format);

    info!(
        precision = config.geohash_precision,
        concurrency = config.fanout_concurrency,
        timeout_ms = config.provider_timeout_ms,
        "Starting locator-service"
    );

    let store = InMemoryStore::new(
        config.engine_settings().codec,
        config.geohash_precision,
    );
    match config.seed_path.as_deref() {
        Some(path) => {
            store
                .load_json(path)
                .await
                .with_context(|| format!("Failed to seed store from {}", path))?;
        }
        None => info!("No SEED_PATH set; starting with an empty store"),
    }

    let (shutdown_handle, shutdown) = cancel_pair();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                shutdown_handle.cancel();
            }
            Err(e) => error!(error = %e, "Failed to listen for ctrl+c"),
        }
    });

    let locator = Locator::new(config, Arc::new(store))
        .context("Failed to build query engine")?
        .with_shutdown(shutdown.clone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut handled: u64 = 0;

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line.context("Failed to read request")?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let response = locator.handle_line(&line).await;
        stdout.write_all(response.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
        handled += 1;
    }

    info!(handled, "locator-service stopped");
    Ok(())
}

/// Logs go to stderr; stdout carries responses only.
fn init_tracing(log_format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "locator_service=info,info".into());

    if log_format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
