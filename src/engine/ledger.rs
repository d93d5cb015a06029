//! Round ledger: the durable per-round bet history.
//!
//! Single writer for `Round` entries. Bets are recorded when placed,
//! settled once when the round closes, and never deleted. Stats are always
//! a fold over the history plus a live balance snapshot.

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

use crate::storage::RoundStore;
use crate::types::{BalanceSnapshot, Outcome, Round, RoundError, Side, Stats};

pub struct RoundLedger {
    rounds: BTreeMap<u64, Round>,
    store: Box<dyn RoundStore>,
}

impl RoundLedger {
    /// Open a ledger, loading any history the store already holds.
    pub fn open(store: Box<dyn RoundStore>) -> anyhow::Result<Self> {
        let rounds = store
            .load()?
            .into_iter()
            .map(|r| (r.epoch, r))
            .collect::<BTreeMap<_, _>>();
        Ok(Self { rounds, store })
    }

    pub fn get(&self, epoch: u64) -> Option<&Round> {
        self.rounds.get(&epoch)
    }

    pub fn rounds(&self) -> impl Iterator<Item = &Round> {
        self.rounds.values()
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    /// Epochs with a placed bet that has not settled yet.
    pub fn open_bets(&self) -> Vec<u64> {
        self.rounds
            .values()
            .filter(|r| r.has_bet() && !r.settled)
            .map(|r| r.epoch)
            .collect()
    }

    /// First epoch a resumed run may use: `start_epoch`, or one past the
    /// newest epoch already in the history.
    pub fn resume_epoch(&self, start_epoch: u64) -> u64 {
        self.rounds
            .keys()
            .next_back()
            .map_or(start_epoch, |last| start_epoch.max(last + 1))
    }

    /// Append a placed bet. A second bet for the same epoch is rejected.
    pub fn record_bet(&mut self, epoch: u64, stake: Decimal, side: Side) -> Result<(), RoundError> {
        if let Some(existing) = self.rounds.get(&epoch) {
            warn!(epoch, existing = %existing, "Duplicate bet record rejected");
            return Err(RoundError::DuplicateBet(epoch));
        }

        self.rounds.insert(epoch, Round::bet(epoch, stake, side));
        self.persist();
        info!(epoch, %side, %stake, "Bet recorded");
        Ok(())
    }

    /// Attach an outcome to a round. Rounds that were never bet on get a
    /// synthetic no-bet entry. Settling twice is rejected.
    pub fn settle(
        &mut self,
        epoch: u64,
        outcome: Outcome,
        payout: Option<Decimal>,
    ) -> Result<&Round, RoundError> {
        let round = self.rounds.entry(epoch).or_insert_with(|| {
            debug!(epoch, "Settling round without a bet");
            Round::no_bet(epoch)
        });

        if round.settled {
            warn!(epoch, outcome = %round.outcome, "Round already settled");
            return Err(RoundError::AlreadySettled(epoch));
        }

        round.settled = true;
        round.outcome = if round.has_bet() { outcome } else { Outcome::Unknown };
        round.payout = payout;
        round.settled_at = Some(Utc::now());
        info!(epoch, outcome = %round.outcome, "Round settled");

        self.persist();
        self.rounds
            .get(&epoch)
            .ok_or_else(|| RoundError::Storage(format!("round {epoch} vanished")))
    }

    /// Fold the settled history into win/loss stats. Fiat profit comes
    /// from the balance snapshot when one is available.
    pub fn compute_stats(&self, snapshot: Option<&BalanceSnapshot>) -> Stats {
        let mut stats = Stats::default();

        for round in self.rounds.values().filter(|r| r.settled && r.has_bet()) {
            match round.outcome {
                Outcome::Win => stats.win_count += 1,
                Outcome::Loss => stats.loss_count += 1,
                Outcome::Unknown => {}
            }
            stats.realized_native += round.realized_pnl();
        }

        let resolved = stats.win_count + stats.loss_count;
        if resolved > 0 {
            stats.win_percentage = stats.win_count as f64 / resolved as f64 * 100.0;
        }

        if let Some(snap) = snapshot {
            stats.profit_fiat = snap.profit_fiat();
        }
        stats
    }

    // Persistence failures are logged; the in-memory history stays authoritative.
    fn persist(&self) {
        let rounds: Vec<Round> = self.rounds.values().cloned().collect();
        if let Err(e) = self.store.save(&rounds) {
            error!(error = %e, "Failed to persist round history");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
