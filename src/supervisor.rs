use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::types::AppConfig;
use crate::sink::{DatabaseSink, FileSink, LogSink};
use crate::worker::PollingWorker;

/// How long to wait for workers to notice cancellation before exiting anyway.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Start one worker per configured server and block until a shutdown signal
/// arrives, then cancel and drain. Holds no protocol knowledge; everything
/// protocol-shaped lives in the workers.
pub async fn run(config: AppConfig) -> Result<()> {
    let sinks = build_sinks(&config).await?;
    info!(
        servers = config.servers.len(),
        sinks = sinks.len(),
        "Starting polling workers"
    );

    let shutdown = CancellationToken::new();
    let handles = spawn_workers(&config, sinks, shutdown.clone());

    wait_for_signal().await;
    info!("Shutdown signal received; stopping workers");
    shutdown.cancel();

    let drain = async {
        for handle in handles {
            let _ = handle.await;
        }
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        warn!(
            grace_secs = SHUTDOWN_GRACE.as_secs(),
            "Workers did not stop within the grace period; exiting anyway"
        );
    } else {
        info!("All workers stopped");
    }
    Ok(())
}

/// Construct the enabled sinks.
///
/// An unreachable database is fatal only when it is the sole sink; with a
/// file sink also enabled it degrades to a warning and the process runs on
/// files alone.
pub async fn build_sinks(config: &AppConfig) -> Result<Vec<Arc<dyn LogSink>>> {
    let mut sinks: Vec<Arc<dyn LogSink>> = Vec::new();

    if config.sinks.database.enabled {
        let pool_size = config.servers.len() as u32;
        let timeout = Duration::from_secs(config.polling.connect_timeout_secs);
        match DatabaseSink::connect(&config.sinks.database.url, pool_size, timeout).await {
            Ok(sink) => sinks.push(Arc::new(sink)),
            Err(e) if config.sinks.file.enabled => {
                warn!(
                    error = %e,
                    "Database unreachable at startup; continuing with the file sink only"
                );
            }
            Err(e) => {
                return Err(e).context("database sink is the only enabled sink and is unreachable")
            }
        }
    }

    if config.sinks.file.enabled {
        sinks.push(Arc::new(FileSink::new(&config.sinks.file.path)));
    }

    Ok(sinks)
}

/// Spawn one detached worker task per server. Workers share nothing but the
/// sink instances; each gets a child of the shutdown token.
pub fn spawn_workers(
    config: &AppConfig,
    sinks: Vec<Arc<dyn LogSink>>,
    shutdown: CancellationToken,
) -> Vec<tokio::task::JoinHandle<()>> {
    let filters = Arc::new(config.polling.effective_keywords());
    let sinks = Arc::new(sinks);

    config
        .servers
        .iter()
        .map(|target| {
            let worker = PollingWorker::new(
                target.clone(),
                filters.clone(),
                sinks.clone(),
                &config.polling,
                shutdown.child_token(),
            );
            tokio::spawn(worker.run())
        })
        .collect()
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("SIGTERM received"),
        r = tokio::signal::ctrl_c() => {
            if let Err(e) = r {
                error!(error = %e, "Failed to listen for ctrl-c");
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for ctrl-c");
    }
}
