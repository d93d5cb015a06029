//! Signal aggregator.
//!
//! Queries the analyzer at a short and a medium timeframe and averages
//! the buy/sell/neutral counts into one composite signal. Any failed or
//! unparsable reading makes the whole composite unavailable.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::data::SignalAnalyzer;
use crate::types::{CompositeSignal, RoundError};

pub struct SignalAggregator {
    analyzer: Arc<dyn SignalAnalyzer>,
    symbol: String,
    short_interval: String,
    medium_interval: String,
}

impl SignalAggregator {
    pub fn new(
        analyzer: Arc<dyn SignalAnalyzer>,
        symbol: &str,
        short_interval: &str,
        medium_interval: &str,
    ) -> Self {
        Self {
            analyzer,
            symbol: symbol.to_string(),
            short_interval: short_interval.to_string(),
            medium_interval: medium_interval.to_string(),
        }
    }

    /// Fetch both timeframes concurrently and average them.
    pub async fn fetch_composite(&self) -> Result<CompositeSignal, RoundError> {
        let (short, medium) = tokio::join!(
            self.analyzer.analyze(&self.symbol, &self.short_interval),
            self.analyzer.analyze(&self.symbol, &self.medium_interval),
        );

        let short = short.map_err(|e| self.unavailable(&self.short_interval, e))?;
        let medium = medium.map_err(|e| self.unavailable(&self.medium_interval, e))?;

        let composite = CompositeSignal::average(&[short, medium])
            .ok_or_else(|| RoundError::SignalUnavailable("no readings".into()))?;

        debug!(
            symbol = %self.symbol,
            short = ?short,
            medium = ?medium,
            %composite,
            "Composite signal"
        );
        Ok(composite)
    }

    fn unavailable(&self, timeframe: &str, err: anyhow::Error) -> RoundError {
        warn!(symbol = %self.symbol, timeframe, error = %err, "Signal fetch failed");
        RoundError::SignalUnavailable(format!("{timeframe}: {err:#}"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
