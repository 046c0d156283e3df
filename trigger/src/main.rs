use std::env;
use std::error::Error;

use tokio::io::{self, BufReader};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use trigger_core::TriggerSettings;

mod setup_tracing;

/// Base64 encoded JSON document with the subscription and the trigger config.
const ENV_TRIGGER_CONFIG: &str = "TRIGGER_CONFIG_OBJECT";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_tracing::register();

    if let Err(e) = run().await {
        error!("{e:?}");
        return Err(e);
    }
    info!("Exiting...");

    Ok(())
}

async fn run() -> Result<(), Box<dyn Error>> {
    let settings_obj = env::var(ENV_TRIGGER_CONFIG)
        .map_err(|e| format!("Reading {ENV_TRIGGER_CONFIG} environment variable: {e}"))?;
    let settings = TriggerSettings::load(settings_obj)?;
    info!(
        subscription_id = %settings.subscription.id,
        sink = %settings.subscription.sink,
        config = ?settings.config,
        "Starting trigger"
    );

    let shutdown = CancellationToken::new();
    let signal_handle = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let commit_offsets =
        trigger_core::runner::run(settings, BufReader::new(io::stdin()), shutdown).await;
    signal_handle.abort();
    let commit_offsets = commit_offsets?;

    for offset in commit_offsets {
        info!(%offset, "Commit offset");
    }
    match trigger_core::metrics::metrics_text() {
        Ok(metrics) => debug!("{metrics}"),
        Err(e) => error!(?e, "Encoding metrics failed"),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(?e, "Failed to listen for Ctrl+C");
            return std::future::pending().await;
        }
        info!("Received Ctrl+C signal");
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal");
            }
            Err(e) => {
                error!(?e, "Failed to install terminate signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
