//! Read-only market data providers.
//!
//! Defines the `PriceFeed` and `SignalAnalyzer` traits and provides
//! HTTP implementations for the Binance ticker and a technical-analysis
//! summary service.

pub mod binance;
pub mod technical;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::SignalSummary;

/// Spot price source for the native asset.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Current fiat price of one native unit.
    async fn current_price(&self) -> Result<Decimal>;
}

/// Multi-timeframe technical analysis source.
///
/// Each call returns the raw buy/sell/neutral indicator counts for a
/// symbol at one timeframe (e.g. "1m", "5m").
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignalAnalyzer: Send + Sync {
    async fn analyze(&self, symbol: &str, timeframe: &str) -> Result<SignalSummary>;
}
