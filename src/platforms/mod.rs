//! Betting platform integrations.
//!
//! Defines the `BettingClient` trait over a round-based up/down prediction
//! contract and provides a paper-trading implementation for dry runs.

pub mod paper;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::Side;

/// Receipt for a confirmed bet transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct BetReceipt {
    pub tx_hash: String,
    pub epoch: u64,
    pub side: Side,
    pub stake: Decimal,
}

/// Abstraction over the on-chain prediction contract.
///
/// `place_bet` and `claim` resolve only once the transaction is confirmed;
/// a reverted or dropped transaction is an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BettingClient: Send + Sync {
    /// Stake `stake` native units on `side` for round `epoch`.
    async fn place_bet(&self, side: Side, stake: Decimal, epoch: u64) -> Result<BetReceipt>;

    /// Whether the wallet has a claimable payout for `epoch`.
    async fn is_claimable(&self, epoch: u64) -> Result<bool>;

    /// Claim the payout for `epoch`. Returns the credited amount when known.
    async fn claim(&self, epoch: u64) -> Result<Option<Decimal>>;

    /// Current native balance of the betting wallet.
    async fn balance(&self) -> Result<Decimal>;

    /// Platform name for logging and identification.
    fn name(&self) -> &str;
}
