use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use super::engine::ProximityAlertEngine;
use crate::runtime::{self, AsyncHandle};

/// Periodic driver for [`ProximityAlertEngine`].
///
/// Late ticks are skipped rather than bunched up, and a tick that lands while
/// a cycle is still running is a no-op.
pub struct AlertScheduler {
    handle: Box<dyn AsyncHandle>,
    period: Duration,
}

impl AlertScheduler {
    /// Start evaluating every `period`; the first cycle runs immediately
    pub fn start(engine: Arc<ProximityAlertEngine>, period: Duration) -> Self {
        log::info!("alert scheduler running every {:?}", period);

        let handle = runtime::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if engine.is_evaluating() {
                    log::debug!("previous alert cycle still running");
                    continue;
                }

                let engine = Arc::clone(&engine);
                match runtime::async_utils::run_blocking(move || engine.evaluate()).await {
                    Ok(events) if !events.is_empty() => {
                        log::debug!("alert cycle emitted {} events", events.len())
                    }
                    Ok(_) => {}
                    Err(e) => log::warn!("alert cycle failed: {}", e),
                }
            }
        });

        Self { handle, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn shutdown(&self) {
        log::info!("stopping alert scheduler");
        self.handle.cancel();
    }
}

impl Drop for AlertScheduler {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}
