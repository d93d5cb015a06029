//! Paper-trading platform.
//!
//! Simulates the prediction contract in memory so the full round cycle
//! can run without a wallet. A bet debits the stake and remembers the
//! price at placement; the round is claimable when the price at
//! settlement has moved in the bet direction. Claims credit
//! `stake * payout_multiplier`. The book lives only as long as the
//! process, so rounds it never saw cannot be resolved.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::{BetReceipt, BettingClient};
use crate::data::PriceFeed;
use crate::types::Side;

const PLATFORM_NAME: &str = "paper";

#[derive(Debug, Clone)]
struct PaperBet {
    side: Side,
    stake: Decimal,
    entry_price: Decimal,
    claimed: bool,
}

#[derive(Debug, Default)]
struct Book {
    balance: Decimal,
    bets: HashMap<u64, PaperBet>,
}

pub struct PaperPlatform {
    prices: Arc<dyn PriceFeed>,
    payout_multiplier: Decimal,
    book: Mutex<Book>,
}

impl PaperPlatform {
    pub fn new(prices: Arc<dyn PriceFeed>, initial_balance: Decimal, payout_multiplier: Decimal) -> Self {
        Self {
            prices,
            payout_multiplier,
            book: Mutex::new(Book {
                balance: initial_balance,
                bets: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Book>> {
        self.book
            .lock()
            .map_err(|_| anyhow!("paper book lock poisoned"))
    }

    fn is_winner(bet: &PaperBet, close_price: Decimal) -> bool {
        match bet.side {
            Side::Up => close_price > bet.entry_price,
            Side::Down => close_price < bet.entry_price,
        }
    }
}

#[async_trait]
impl BettingClient for PaperPlatform {
    async fn place_bet(&self, side: Side, stake: Decimal, epoch: u64) -> Result<BetReceipt> {
        if stake <= Decimal::ZERO {
            bail!("stake must be positive, got {stake}");
        }
        let entry_price = self.prices.current_price().await?;

        let mut book = self.lock()?;
        if book.bets.contains_key(&epoch) {
            bail!("already bet on round {epoch}");
        }
        if book.balance < stake {
            bail!("insufficient balance: need {stake}, have {}", book.balance);
        }
        book.balance -= stake;
        book.bets.insert(
            epoch,
            PaperBet {
                side,
                stake,
                entry_price,
                claimed: false,
            },
        );

        let receipt = BetReceipt {
            tx_hash: format!("paper-{}", uuid::Uuid::new_v4()),
            epoch,
            side,
            stake,
        };
        debug!(epoch, %side, %stake, %entry_price, tx = %receipt.tx_hash, "[PAPER] Bet placed");
        Ok(receipt)
    }

    async fn is_claimable(&self, epoch: u64) -> Result<bool> {
        let bet = {
            let book = self.lock()?;
            match book.bets.get(&epoch) {
                Some(b) if !b.claimed => b.clone(),
                Some(_) => return Ok(false),
                // Placed by an earlier process; its entry price is gone.
                None => bail!("no paper bet on round {epoch}"),
            }
        };
        let close_price = self.prices.current_price().await?;
        Ok(Self::is_winner(&bet, close_price))
    }

    async fn claim(&self, epoch: u64) -> Result<Option<Decimal>> {
        let mut book = self.lock()?;
        let payout = match book.bets.get_mut(&epoch) {
            Some(bet) if !bet.claimed => {
                bet.claimed = true;
                bet.stake * self.payout_multiplier
            }
            Some(_) => bail!("round {epoch} already claimed"),
            None => bail!("no bet on round {epoch}"),
        };
        book.balance += payout;
        info!(epoch, %payout, balance = %book.balance, "[PAPER] Claimed");
        Ok(Some(payout))
    }

    async fn balance(&self) -> Result<Decimal> {
        Ok(self.lock()?.balance)
    }

    fn name(&self) -> &str {
        PLATFORM_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
