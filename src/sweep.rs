//! Periodic accrual sweep.
//!
//! An external-scheduler stand-in: settles every known player on a fixed
//! interval. One player's failure is logged and skipped, never fatal to
//! the rest of the sweep.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::EconomyEngine;

/// Aggregate result of one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Players visited.
    pub players: usize,
    /// Players whose settlement earned a positive amount.
    pub settled: usize,
    /// Total coins credited across the pass.
    pub earned_total: u64,
    /// Players skipped due to a settlement failure.
    pub failures: usize,
}

pub struct AccrualSweep {
    engine: Arc<EconomyEngine>,
}

impl AccrualSweep {
    pub fn new(engine: Arc<EconomyEngine>) -> Self {
        Self { engine }
    }

    /// Settles accrual for every known player once.
    pub fn run_once(&self) -> SweepReport {
        let mut report = SweepReport::default();
        for id in self.engine.player_ids() {
            report.players += 1;
            match self.engine.settle(&id) {
                Ok(outcome) => {
                    if outcome.earned > 0 {
                        report.settled += 1;
                        report.earned_total += outcome.earned;
                    }
                }
                Err(e) => {
                    warn!(player = %id, error = %e, "sweep: settlement failed, skipping player");
                    report.failures += 1;
                }
            }
        }
        debug!(
            players = report.players,
            settled = report.settled,
            earned = report.earned_total,
            failures = report.failures,
            "accrual sweep pass complete"
        );
        report
    }

    /// Runs the sweep on `interval` until the returned sender is dropped or
    /// signalled.
    pub fn spawn(self, interval: Duration) -> (JoinHandle<()>, watch::Sender<bool>) {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick fires immediately; skip it so the cadence starts
            // one interval after spawn.
            ticker.tick().await;
            info!(interval_secs = interval.as_secs(), "accrual sweep started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once();
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("accrual sweep stopping");
                            break;
                        }
                    }
                }
            }
        });
        (handle, shutdown_tx)
    }
}
