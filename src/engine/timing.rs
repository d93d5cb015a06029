//! Adaptive timing controller.
//!
//! Owns the delay between a round start and the decision. Every failed bet
//! transaction pulls the decision two blocks earlier; the delay is clamped
//! at a configured floor and never grows back during the process lifetime.

use std::time::Duration;
use tracing::{info, warn};

/// Number of blocks the wait shrinks by on each failed bet.
const BLOCKS_PER_FAILURE: u32 = 2;

#[derive(Debug, Clone)]
pub struct TimingController {
    wait: Duration,
    block_time: Duration,
    floor: Duration,
}

impl TimingController {
    /// `floor` is capped at `wait`.
    pub fn new(wait: Duration, block_time: Duration, floor: Duration) -> Self {
        Self {
            wait,
            block_time,
            floor: floor.min(wait),
        }
    }

    /// Wait used for the next round.
    pub fn current_wait(&self) -> Duration {
        self.wait
    }

    pub fn floor(&self) -> Duration {
        self.floor
    }

    /// The decrement applied on each failure.
    pub fn step(&self) -> Duration {
        self.block_time * BLOCKS_PER_FAILURE
    }

    /// Shrink the wait after a failed bet transaction. Returns the new wait.
    pub fn on_bet_failure(&mut self) -> Duration {
        let previous = self.wait;
        let shrunk = previous.saturating_sub(self.step());

        if shrunk < self.floor {
            self.wait = self.floor;
            warn!(
                previous_ms = previous.as_millis() as u64,
                wait_ms = self.wait.as_millis() as u64,
                "Waiting time clamped at floor"
            );
        } else {
            self.wait = shrunk;
            info!(
                previous_ms = previous.as_millis() as u64,
                wait_ms = self.wait.as_millis() as u64,
                "Waiting time reduced by two blocks"
            );
        }
        self.wait
    }
}
