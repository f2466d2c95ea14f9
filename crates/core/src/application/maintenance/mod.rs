// Controller maintenance - periodic cleanup safety net. Individual
// controller calls already reap expired locks opportunistically, but a
// background sweep keeps the registry tidy even on an idle controller
// nobody is currently calling.

use crate::error::Result;
use crate::port::Controller;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info};

pub struct ControllerMaintenanceScheduler {
    controller: Arc<dyn Controller>,
    interval: Duration,
    requeue: bool,
}

impl ControllerMaintenanceScheduler {
    /// `requeue` governs what the safety-net sweep does with orphaned
    /// `running` records: re-queue them if `true`,
    /// force-fail them if `false`. Matches the policy callers already
    /// pass to `Controller::cleanup` directly.
    pub fn new(controller: Arc<dyn Controller>, interval: Duration, requeue: bool) -> Self {
        Self {
            controller,
            interval,
            requeue,
        }
    }

    /// Background loop; spawn with `tokio::spawn`.
    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "maintenance scheduler started");
        let mut tick = interval(self.interval);
        loop {
            tick.tick().await;
            if let Err(e) = self.controller.cleanup(self.requeue).await {
                error!(error = %e, "scheduled cleanup failed");
            }
        }
    }

    pub async fn run_now(&self) -> Result<()> {
        self.controller.cleanup(self.requeue).await?;
        Ok(())
    }
}
