//! Technical-analysis summary client.
//!
//! Talks to an HTTP analysis service that aggregates oscillator and
//! moving-average recommendations per timeframe and returns a summary
//! of how many indicators vote BUY / SELL / NEUTRAL.
//!
//! Endpoint: GET {base}/analysis?symbol=..&screener=..&exchange=..&interval=..
//! Response: `{"summary": {"RECOMMENDATION": "BUY", "BUY": 12, "SELL": 5, "NEUTRAL": 9}}`
//! Counts may arrive as integers or as numeric strings.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::SignalAnalyzer;
use crate::types::SignalSummary;

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    summary: Option<RawSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct RawSummary {
    buy: Count,
    sell: Count,
    neutral: Count,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Count {
    Int(u64),
    Text(String),
}

impl Count {
    fn value(&self, field: &str) -> Result<u32> {
        match self {
            Count::Int(n) => u32::try_from(*n)
                .with_context(|| format!("{field} count out of range: {n}")),
            Count::Text(s) => s
                .trim()
                .parse::<u32>()
                .with_context(|| format!("{field} count is not a number: {s:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct TechnicalAnalysisClient {
    http: Client,
    base_url: String,
    screener: String,
    exchange: String,
}

impl TechnicalAnalysisClient {
    pub fn new(base_url: &str, screener: &str, exchange: &str, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("PROPHET/0.1.0 (round-prediction-agent)")
            .build()
            .context("Failed to build HTTP client for analysis service")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            screener: screener.to_string(),
            exchange: exchange.to_string(),
        })
    }

    fn analysis_url(&self, symbol: &str, timeframe: &str) -> String {
        format!(
            "{}/analysis?symbol={}&screener={}&exchange={}&interval={}",
            self.base_url,
            urlencoding::encode(symbol),
            urlencoding::encode(&self.screener),
            urlencoding::encode(&self.exchange),
            urlencoding::encode(timeframe),
        )
    }

    /// Parse a response body into indicator counts.
    fn parse_summary(body: &str) -> Result<SignalSummary> {
        let resp: AnalysisResponse =
            serde_json::from_str(body).context("Failed to parse analysis response")?;
        let raw = resp.summary.context("Analysis response has no summary")?;

        Ok(SignalSummary {
            buy: raw.buy.value("BUY")?,
            sell: raw.sell.value("SELL")?,
            neutral: raw.neutral.value("NEUTRAL")?,
        })
    }
}

#[async_trait]
impl SignalAnalyzer for TechnicalAnalysisClient {
    async fn analyze(&self, symbol: &str, timeframe: &str) -> Result<SignalSummary> {
        let url = self.analysis_url(symbol, timeframe);
        debug!(url = %url, "Fetching technical analysis");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("Analysis service request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Analysis service error {status}: {body}");
        }

        let body = resp.text().await.context("Failed to read analysis response")?;
        let summary = Self::parse_summary(&body)
            .with_context(|| format!("Bad analysis payload for {symbol} {timeframe}"))?;

        debug!(
            symbol,
            timeframe,
            buy = summary.buy,
            sell = summary.sell,
            neutral = summary.neutral,
            "Analysis summary"
        );
        Ok(summary)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
