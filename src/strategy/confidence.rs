//! Confidence policy.
//!
//! Converts a composite buy/sell signal into a directional decision and a
//! confidence percentage. A side is only taken when it strictly dominates
//! the other and its share of the buy+sell votes reaches the threshold.

use tracing::debug;

use crate::types::{CompositeSignal, Decision};

/// Share of `a` in `a + b` as an unrounded percentage. 0 when both are zero.
fn share(a: f64, b: f64) -> f64 {
    let total = a + b;
    if total <= 0.0 {
        return 0.0;
    }
    100.0 * a / total
}

/// Share of `a` in `a + b`, as a whole percentage rounded half away from zero.
///
/// Returns 0 when both inputs are zero. Only used for reporting; the
/// threshold is checked against the unrounded share.
pub fn percentage(a: f64, b: f64) -> u8 {
    share(a, b).round().clamp(0.0, 100.0) as u8
}

/// Threshold-based decision policy.
#[derive(Debug, Clone, Copy)]
pub struct ConfidencePolicy {
    threshold: u8,
}

impl ConfidencePolicy {
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Decide for a composite signal.
    ///
    /// Abstentions carry the dominant side's confidence for reporting (50
    /// on a tie, 0 when there are no buy or sell votes at all).
    pub fn decide(&self, signal: &CompositeSignal) -> Decision {
        let (buy, sell) = (signal.buy, signal.sell);

        if buy + sell <= 0.0 {
            debug!("No buy or sell votes");
            return Decision::abstain(0);
        }

        let decision = if buy > sell {
            let confidence = percentage(buy, sell);
            if self.clears(buy, sell) {
                Decision::up(confidence)
            } else {
                Decision::abstain(confidence)
            }
        } else if sell > buy {
            let confidence = percentage(sell, buy);
            if self.clears(sell, buy) {
                Decision::down(confidence)
            } else {
                Decision::abstain(confidence)
            }
        } else {
            Decision::abstain(percentage(sell, buy))
        };

        debug!(%signal, threshold = self.threshold, %decision, "Policy decision");
        decision
    }

    /// Whether the dominant side's raw share reaches the threshold.
    fn clears(&self, dominant: f64, other: f64) -> bool {
        share(dominant, other) >= f64::from(self.threshold)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
