use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::probe::{Health, Probe};

/// Result of one periodic gateway check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthTick {
    pub monitor: u64,
    pub healthy: bool,
}

/// Check the gateway every `every` until `cancel` fires. The first check
/// happens one period after the call.
pub fn spawn_monitor<E>(
    monitor: u64,
    probe: Arc<dyn Probe>,
    port: u16,
    every: Duration,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<E>,
) where
    E: From<HealthTick> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let healthy = tokio::select! {
                _ = cancel.cancelled() => break,
                health = probe.health(port) => health == Health::Healthy,
            };
            if tx.send(HealthTick { monitor, healthy }.into()).is_err() {
                break;
            }
        }
        debug!(monitor, port, "health monitor stopped");
    });
}
