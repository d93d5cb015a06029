//! Binance spot ticker price feed.
//!
//! API docs: https://binance-docs.github.io/apidocs/spot/en/#symbol-price-ticker
//! Endpoint: GET /api/v3/ticker/price?symbol=BNBUSDT
//! Auth: not required.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use super::PriceFeed;

#[derive(Debug, Deserialize)]
struct TickerPrice {
    symbol: String,
    /// Binance quotes prices as decimal strings.
    price: String,
}

/// Binance REST price feed for a single symbol.
pub struct BinancePriceFeed {
    http: Client,
    base_url: String,
    symbol: String,
}

impl BinancePriceFeed {
    pub fn new(base_url: &str, symbol: &str, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("PROPHET/0.1.0 (round-prediction-agent)")
            .build()
            .context("Failed to build HTTP client for Binance")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            symbol: symbol.to_string(),
        })
    }

    fn parse_ticker(body: &str) -> Result<Decimal> {
        let ticker: TickerPrice =
            serde_json::from_str(body).context("Failed to parse Binance ticker response")?;
        let price = Decimal::from_str(&ticker.price)
            .with_context(|| format!("Invalid price for {}: {}", ticker.symbol, ticker.price))?;
        if price <= Decimal::ZERO {
            anyhow::bail!("Non-positive price for {}: {price}", ticker.symbol);
        }
        Ok(price)
    }
}

#[async_trait]
impl PriceFeed for BinancePriceFeed {
    async fn current_price(&self) -> Result<Decimal> {
        let url = format!(
            "{}/api/v3/ticker/price?symbol={}",
            self.base_url,
            urlencoding::encode(&self.symbol)
        );

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("Binance API request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error {status}: {body}");
        }

        let body = resp.text().await.context("Failed to read Binance response")?;
        let price = Self::parse_ticker(&body)?;
        debug!(symbol = %self.symbol, %price, "Fetched price");
        Ok(price)
    }
}
