//! Shared types for the PROPHET agent.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that data, platform, strategy,
//! and engine modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Bet direction on a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Up,
    Down,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Up => write!(f, "UP"),
            Side::Down => write!(f, "DOWN"),
        }
    }
}

/// Settlement result attached to a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Loss,
    Unknown,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Win => write!(f, "WIN"),
            Outcome::Loss => write!(f, "LOSS"),
            Outcome::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Lifecycle phase of a single round epoch inside the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    Idle,
    Waiting,
    Deciding,
    Betting,
    AwaitingSettlement,
}

/// Notifications emitted by the round event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEvent {
    StartRound(u64),
    EndRound(u64),
}

impl RoundEvent {
    pub fn epoch(&self) -> u64 {
        match self {
            RoundEvent::StartRound(e) | RoundEvent::EndRound(e) => *e,
        }
    }
}

// ---------------------------------------------------------------------------
// Signals & decisions
// ---------------------------------------------------------------------------

/// Raw buy/sell/neutral indicator counts for one timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignalSummary {
    pub buy: u32,
    pub sell: u32,
    pub neutral: u32,
}

/// Arithmetic mean of the readings across the analysed timeframes.
///
/// Fields are never negative. They are not normalised to any fixed total.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CompositeSignal {
    pub buy: f64,
    pub sell: f64,
    pub neutral: f64,
}

impl CompositeSignal {
    /// Average a set of per-timeframe readings. Returns `None` for an empty set.
    pub fn average(readings: &[SignalSummary]) -> Option<Self> {
        if readings.is_empty() {
            return None;
        }
        let n = readings.len() as f64;
        let sum = |f: fn(&SignalSummary) -> u32| {
            readings.iter().map(|r| f64::from(f(r))).sum::<f64>() / n
        };
        Some(Self {
            buy: sum(|r| r.buy),
            sell: sum(|r| r.sell),
            neutral: sum(|r| r.neutral),
        })
    }
}

impl fmt::Display for CompositeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "buy={:.1} sell={:.1} neutral={:.1}",
            self.buy, self.sell, self.neutral
        )
    }
}

/// Output of the confidence policy. `side == None` means abstain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub side: Option<Side>,
    /// Confidence percentage, 0–100.
    pub confidence: u8,
}

impl Decision {
    pub fn up(confidence: u8) -> Self {
        Self { side: Some(Side::Up), confidence }
    }

    pub fn down(confidence: u8) -> Self {
        Self { side: Some(Side::Down), confidence }
    }

    pub fn abstain(confidence: u8) -> Self {
        Self { side: None, confidence }
    }

    pub fn is_abstain(&self) -> bool {
        self.side.is_none()
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.side {
            Some(side) => write!(f, "{side} {}%", self.confidence),
            None => write!(f, "ABSTAIN {}%", self.confidence),
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger types
// ---------------------------------------------------------------------------

/// One entry of the durable round history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub epoch: u64,
    /// Stake in native-asset units. Zero for abstained rounds.
    pub bet_amount: Decimal,
    pub side: Option<Side>,
    pub settled: bool,
    pub outcome: Outcome,
    /// Amount credited by a successful claim, in native units.
    #[serde(default)]
    pub payout: Option<Decimal>,
    pub placed_at: DateTime<Utc>,
    #[serde(default)]
    pub settled_at: Option<DateTime<Utc>>,
}

impl Round {
    /// A freshly placed, unsettled bet.
    pub fn bet(epoch: u64, stake: Decimal, side: Side) -> Self {
        Self {
            epoch,
            bet_amount: stake,
            side: Some(side),
            settled: false,
            outcome: Outcome::Unknown,
            payout: None,
            placed_at: Utc::now(),
            settled_at: None,
        }
    }

    /// Synthetic entry for a round that closed without a bet.
    pub fn no_bet(epoch: u64) -> Self {
        Self {
            epoch,
            bet_amount: Decimal::ZERO,
            side: None,
            settled: false,
            outcome: Outcome::Unknown,
            payout: None,
            placed_at: Utc::now(),
            settled_at: None,
        }
    }

    pub fn has_bet(&self) -> bool {
        self.side.is_some()
    }

    /// Realized native P&L of a settled bet: payout minus stake on a win,
    /// minus stake on a loss. Unknown outcomes and open rounds count as zero.
    pub fn realized_pnl(&self) -> Decimal {
        if !self.settled || !self.has_bet() {
            return Decimal::ZERO;
        }
        match self.outcome {
            Outcome::Win => self.payout.unwrap_or(self.bet_amount) - self.bet_amount,
            Outcome::Loss => -self.bet_amount,
            Outcome::Unknown => Decimal::ZERO,
        }
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = self.side.map(|s| s.to_string()).unwrap_or_else(|| "NO BET".into());
        write!(
            f,
            "#{} {} stake={} settled={} outcome={}",
            self.epoch, side, self.bet_amount, self.settled, self.outcome
        )
    }
}

/// Live balance and price used to value the history in fiat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceSnapshot {
    /// Current native balance.
    pub balance: Decimal,
    /// Native balance at startup.
    pub starting_balance: Decimal,
    /// Fiat per native unit.
    pub price: Decimal,
}

impl BalanceSnapshot {
    /// Net balance delta converted at the snapshot price.
    pub fn profit_fiat(&self) -> Decimal {
        (self.balance - self.starting_balance) * self.price
    }
}

/// Performance statistics derived from the round history.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stats {
    pub win_count: u64,
    pub loss_count: u64,
    pub profit_fiat: Decimal,
    /// Win rate as a percentage. 0.0 when nothing has resolved.
    pub win_percentage: f64,
    /// Sum of realized payouts minus stakes, in native units.
    pub realized_native: Decimal,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fortune={:.1}% | {}W/{}L | profit=${:.3}",
            self.win_percentage, self.win_count, self.loss_count, self.profit_fiat
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for PROPHET.
#[derive(Debug, thiserror::Error)]
pub enum RoundError {
    #[error("Price unavailable: {0}")]
    PriceUnavailable(String),

    #[error("Signal unavailable: {0}")]
    SignalUnavailable(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Claim failed for round {epoch}: {message}")]
    Claim { epoch: u64, message: String },

    #[error("Bet already recorded for round {0}")]
    DuplicateBet(u64),

    #[error("Round {0} already settled")]
    AlreadySettled(u64),

    #[error("Storage error: {0}")]
    Storage(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
