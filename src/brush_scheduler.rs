//! Periodic cycle scheduling
//!
//! This module provides the background task that runs one control cycle
//! per configured interval. The interval is floor-clamped so a typo in the
//! configuration cannot turn the loop into a polling hammer, and the task
//! exits promptly when the manager is shut down.
//!
//! A manual "run once now" needs no scheduler involvement: call
//! [`BrushManager::run_cycle`] directly, and the manager's cycle lock
//! serializes it against the timer.
//!
//! # Example
//!
//! ```no_run
//! use qbit_brush::{BrushManager, BrushScheduler, Config};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let manager = Arc::new(BrushManager::new(config)?);
//!
//! let scheduler = BrushScheduler::new(manager.clone());
//!
//! // Run scheduler (blocks until shutdown)
//! tokio::spawn(async move {
//!     scheduler.run().await;
//! });
//! # Ok(())
//! # }
//! ```

use crate::brush::BrushManager;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{info, warn};

/// Background task running one cycle per configured interval
///
/// The first cycle runs immediately; subsequent cycles run after each
/// interval elapses. Cancellation (via [`BrushManager::shutdown`] or the
/// manager's token) wakes the task out of its sleep and ends it.
pub struct BrushScheduler {
    /// Manager whose cycles this task drives
    manager: Arc<BrushManager>,
}

impl BrushScheduler {
    /// Creates a new scheduler for the given manager
    pub fn new(manager: Arc<BrushManager>) -> Self {
        Self { manager }
    }

    /// Run cycles until the manager is shut down
    ///
    /// Each iteration:
    /// 1. Exit if cancellation was requested
    /// 2. Run one full cycle across all configured clients
    /// 3. Sleep for the clamped interval, waking early on cancellation
    pub async fn run(self) {
        let interval = self.manager.config().effective_interval();
        if interval > self.manager.config().brush.interval {
            warn!(
                configured_secs = self.manager.config().brush.interval.as_secs(),
                effective_secs = interval.as_secs(),
                "cycle interval below the polling floor, clamped"
            );
        }
        info!(interval_secs = interval.as_secs(), "brush scheduler started");

        let cancel = self.manager.cancellation_token();
        loop {
            if cancel.is_cancelled() {
                break;
            }

            let report = self.manager.run_cycle().await;
            info!(
                clients = report.clients.len(),
                pruned = report.total_pruned(),
                admitted = report.total_admitted(),
                "cycle finished"
            );

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(interval) => {}
            }
        }

        info!("brush scheduler stopped");
    }
}
