// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Periodic sync trigger.
//!
//! Drives the engine from a timer: every `sync_interval` flush the queue, then
//! run a full round with retry. On shutdown the queue is flushed one last time,
//! which doubles as the "app entering background" signal.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::ReadSyncEngine;

pub struct PeriodicSyncTrigger {
    engine: Arc<ReadSyncEngine>,
    period: Duration,
}

impl PeriodicSyncTrigger {
    /// Tick at the engine's configured `sync_interval_secs`.
    pub fn new(engine: Arc<ReadSyncEngine>) -> Self {
        let period = engine.config().sync_interval();
        Self::with_period(engine, period)
    }

    pub fn with_period(engine: Arc<ReadSyncEngine>, period: Duration) -> Self {
        Self { engine, period: period.max(Duration::from_millis(1)) }
    }

    /// One flush plus one full round. Failures are logged, never returned.
    pub async fn tick(&self) {
        let flushed = self.engine.force_flush().await;
        debug!(drained = flushed.drained(), "Periodic flush");

        if let Err(e) = self.engine.perform_full_sync_with_retry().await {
            warn!(error = %e, "Periodic sync round failed");
        }
    }

    /// Run until `shutdown` turns `true` or its sender is dropped.
    ///
    /// The first round happens one period after start; startup recovery is
    /// the host's job. Returns the number of ticks run.
    #[tracing::instrument(skip_all, fields(period_secs = self.period.as_secs()))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0u64;
        info!("Periodic sync running");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }

                _ = ticker.tick() => {
                    self.tick().await;
                    ticks += 1;
                }
            }
        }

        let last = self.engine.force_flush().await;
        info!(ticks, drained = last.drained(), success = last.is_success(), "Periodic sync stopped");
        ticks
    }
}
