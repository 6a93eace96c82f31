use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::types::{PollingConfig, ServerTarget};
use crate::error::RconError;
use crate::rcon::{showlog_command, RconSession, SUCCESS_MARKER};
use crate::sink::{filter_label, LogSink};
use crate::utils::generate_correlation_id;

/// The per-server resilient control loop.
///
/// States: Connecting -> Polling -> (on failure) Backoff -> Connecting,
/// forever. Retries are unbounded with a fixed interval: a dead server costs
/// one warning per backoff period and nothing else, and no failure of any
/// kind escapes the loop. The only exit is cancellation.
pub struct PollingWorker {
    target: ServerTarget,
    filters: Arc<Vec<String>>,
    sinks: Arc<Vec<Arc<dyn LogSink>>>,
    backoff: Duration,
    filter_delay: Duration,
    cycle_interval: Duration,
    connect_timeout: Duration,
    shutdown: CancellationToken,
}

impl PollingWorker {
    pub fn new(
        target: ServerTarget,
        filters: Arc<Vec<String>>,
        sinks: Arc<Vec<Arc<dyn LogSink>>>,
        polling: &PollingConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            target,
            filters,
            sinks,
            backoff: Duration::from_secs(polling.backoff_secs),
            filter_delay: Duration::from_secs(polling.filter_delay_secs),
            cycle_interval: Duration::from_secs(polling.cycle_interval_secs),
            connect_timeout: Duration::from_secs(polling.connect_timeout_secs),
            shutdown,
        }
    }

    /// Run until cancelled. Never returns early and never panics on protocol
    /// or sink trouble; every failure funnels into the backoff path.
    pub async fn run(self) {
        info!(
            server = %self.target.name,
            host = %self.target.host,
            port = self.target.port,
            filters = self.filters.len(),
            "Worker started"
        );

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            match self.connect_and_poll().await {
                // Ok means the session ended because of cancellation.
                Ok(()) => break,
                Err(e) => {
                    warn!(
                        server = %self.target.name,
                        error = %e,
                        backoff_secs = self.backoff.as_secs(),
                        "Session failed; backing off before reconnect"
                    );
                }
            }
            if self.wait(self.backoff).await {
                break;
            }
        }

        info!(server = %self.target.name, "Worker stopped");
    }

    /// One full session: handshake, then poll filters in order until the
    /// session dies or shutdown is requested. Every new attempt fetches a
    /// fresh key; nothing survives from the previous session.
    async fn connect_and_poll(&self) -> Result<(), RconError> {
        let attempt_id = generate_correlation_id();
        debug!(server = %self.target.name, attempt = %attempt_id, "Connecting");

        let mut session = tokio::select! {
            _ = self.shutdown.cancelled() => return Ok(()),
            r = RconSession::connect(
                &self.target.host,
                self.target.port,
                self.connect_timeout,
            ) => r?,
        };
        session.authenticate(&self.target.password).await?;
        info!(server = %self.target.name, attempt = %attempt_id, "Connected and authenticated");

        loop {
            for filter in self.filters.iter() {
                let command = showlog_command(filter);
                let logs = match session.execute(&command).await {
                    Ok(logs) => logs,
                    Err(e) => {
                        session.close();
                        return Err(e);
                    }
                };

                // A bare success marker is the server's way of saying "no
                // matching lines"; only real content reaches the sinks.
                let trimmed = logs.trim();
                if !trimmed.is_empty() && trimmed != SUCCESS_MARKER {
                    self.dispatch(filter, &logs).await;
                }

                if self.wait(self.filter_delay).await {
                    session.close();
                    return Ok(());
                }
            }

            debug!(server = %self.target.name, "Filter cycle complete");
            if self.wait(self.cycle_interval).await {
                session.close();
                return Ok(());
            }
        }
    }

    async fn dispatch(&self, filter: &str, content: &str) {
        for sink in self.sinks.iter() {
            sink.record(&self.target.name, filter, content).await;
            debug!(
                server = %self.target.name,
                sink = sink.name(),
                filter = %filter_label(filter),
                bytes = content.len(),
                "Log batch recorded"
            );
        }
    }

    /// Sleep that races shutdown. Returns true when cancelled.
    async fn wait(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => true,
            _ = tokio::time::sleep(duration) => false,
        }
    }
}
