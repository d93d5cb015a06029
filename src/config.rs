//! Configuration loading from TOML with validation.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Values that the engine mutates at runtime (the waiting time) are
//! copied into an owned `engine::Configuration` at startup; this struct
//! stays immutable.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub signals: SignalsConfig,
    pub price_feed: PriceFeedConfig,
    pub paper: PaperConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub name: String,
    pub symbol: String,
    /// Fiat stake per round.
    pub bet_amount_usd: f64,
    /// Cumulative fiat profit that halts the agent.
    pub daily_goal_usd: f64,
    /// Delay between a round start and the decision.
    pub waiting_time_ms: u64,
    /// Minimum confidence percentage (50–100) required to bet.
    pub threshold: u8,
    /// Duration of one on-chain block.
    #[serde(default = "default_block_time_ms")]
    pub block_time_ms: u64,
    /// Floor the waiting time never shrinks below.
    #[serde(default = "default_min_waiting_time_ms")]
    pub min_waiting_time_ms: u64,
}

fn default_block_time_ms() -> u64 {
    3_000
}

fn default_min_waiting_time_ms() -> u64 {
    10_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct SignalsConfig {
    pub base_url: String,
    pub screener: String,
    pub exchange: String,
    pub short_interval: String,
    pub medium_interval: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PriceFeedConfig {
    pub base_url: String,
    pub symbol: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaperConfig {
    pub enabled: bool,
    /// Simulated native balance.
    pub initial_balance: f64,
    /// Gross payout per unit staked on a winning round.
    pub payout_multiplier: f64,
    pub round_interval_secs: u64,
    pub start_epoch: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// JSON file holding the round history. In-memory when absent.
    pub ledger_path: Option<String>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Invalid config file: {path}"))
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(contents).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let a = &self.agent;
        if !(50..=100).contains(&a.threshold) {
            bail!("agent.threshold must be within 50..=100, got {}", a.threshold);
        }
        if !(a.bet_amount_usd > 0.0) {
            bail!("agent.bet_amount_usd must be positive, got {}", a.bet_amount_usd);
        }
        if !(a.daily_goal_usd > 0.0) {
            bail!("agent.daily_goal_usd must be positive, got {}", a.daily_goal_usd);
        }
        if a.block_time_ms == 0 {
            bail!("agent.block_time_ms must be positive");
        }
        if a.min_waiting_time_ms > a.waiting_time_ms {
            bail!(
                "agent.min_waiting_time_ms ({}) exceeds agent.waiting_time_ms ({})",
                a.min_waiting_time_ms,
                a.waiting_time_ms
            );
        }
        if self.paper.enabled {
            if !(self.paper.payout_multiplier > 1.0) {
                bail!(
                    "paper.payout_multiplier must be greater than 1, got {}",
                    self.paper.payout_multiplier
                );
            }
            if self.paper.round_interval_secs == 0 {
                bail!("paper.round_interval_secs must be positive");
            }
        }
        Ok(())
    }
}
