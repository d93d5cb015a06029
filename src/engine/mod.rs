//! Core engine: the round-driven wait → signal → decide → bet → settle loop.

pub mod events;
pub mod ledger;
pub mod orchestrator;
pub mod signals;
pub mod timing;

use anyhow::{Context, Result};
use rust_decimal::prelude::*;
use std::time::Duration;

use crate::config::AgentConfig;
use timing::TimingController;

/// Runtime configuration owned by the orchestrator.
///
/// Only `timing` changes after startup, and only through
/// `TimingController::on_bet_failure`.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Fiat stake per round.
    pub bet_amount_usd: Decimal,
    /// Cumulative fiat profit that halts the agent.
    pub daily_goal_usd: Decimal,
    /// Minimum confidence percentage required to bet.
    pub threshold: u8,
    pub timing: TimingController,
}

impl Configuration {
    pub fn from_agent(agent: &AgentConfig) -> Result<Self> {
        Ok(Self {
            bet_amount_usd: Decimal::from_f64(agent.bet_amount_usd)
                .context("bet_amount_usd is not representable as a decimal")?,
            daily_goal_usd: Decimal::from_f64(agent.daily_goal_usd)
                .context("daily_goal_usd is not representable as a decimal")?,
            threshold: agent.threshold,
            timing: TimingController::new(
                Duration::from_millis(agent.waiting_time_ms),
                Duration::from_millis(agent.block_time_ms),
                Duration::from_millis(agent.min_waiting_time_ms),
            ),
        })
    }
}
