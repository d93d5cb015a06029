//! Round event clock.
//!
//! Emits round-boundary notifications on a fixed cadence into the
//! orchestrator's queue. Round `n` is open for bets when it starts, locks
//! when `n + 1` starts and closes when `n + 2` starts, so every tick
//! closes the round two behind the one it opens.
//!
//! A resumed clock can carry a backlog of rounds left open by a previous
//! run; they are closed on the first tick.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::types::RoundEvent;

pub struct RoundClock {
    interval: Duration,
    start_epoch: u64,
    backlog: Vec<u64>,
}

impl RoundClock {
    pub fn new(interval: Duration, start_epoch: u64) -> Self {
        Self {
            interval,
            start_epoch,
            backlog: Vec::new(),
        }
    }

    /// Rounds before `start_epoch` to close on the first tick.
    pub fn with_backlog(mut self, mut epochs: Vec<u64>) -> Self {
        epochs.retain(|e| *e < self.start_epoch);
        epochs.sort_unstable();
        epochs.dedup();
        self.backlog = epochs;
        self
    }

    /// Events emitted when round `epoch` starts.
    pub fn events_for(&self, epoch: u64) -> Vec<RoundEvent> {
        let mut events = Vec::with_capacity(2);
        if epoch == self.start_epoch {
            events.extend(self.backlog.iter().map(|e| RoundEvent::EndRound(*e)));
        }
        if let Some(closing) = epoch.checked_sub(2) {
            if closing >= self.start_epoch {
                events.push(RoundEvent::EndRound(closing));
            }
        }
        events.push(RoundEvent::StartRound(epoch));
        events
    }

    /// Spawn the clock. It stops once the receiver is dropped.
    pub fn spawn(self, tx: mpsc::Sender<RoundEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                start_epoch = self.start_epoch,
                backlog = self.backlog.len(),
                "Round clock started"
            );
            let mut ticker = tokio::time::interval(self.interval);
            let mut epoch = self.start_epoch;
            loop {
                ticker.tick().await;
                for event in self.events_for(epoch) {
                    debug!(epoch = event.epoch(), ?event, "Round event");
                    if tx.send(event).await.is_err() {
                        info!("Round event receiver closed, clock stopping");
                        return;
                    }
                }
                epoch += 1;
            }
        })
    }
}
