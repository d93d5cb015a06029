//! Round orchestrator: the per-epoch state machine.
//!
//! Consumes `StartRound` / `EndRound` notifications from a single queue:
//!
//! ```text
//! StartRound(E) ─► Waiting ──(timer)──► Deciding ──► Betting ──► AwaitingSettlement
//!                                          │            │               │
//!                                          ▼            ▼               ▼
//!                                 Halted / Idle     Idle (failed)   EndRound(E): claim,
//!                                                                   settle, stats, goal
//! ```
//!
//! Rounds pipeline: a new round can be waiting while older ones await
//! settlement. All state is owned by the orchestrator and mutated only
//! from its event loop, so handlers never race each other. Waits are
//! timer tasks in a `JoinSet` that is aborted when the agent halts.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::ledger::RoundLedger;
use super::signals::SignalAggregator;
use super::timing::TimingController;
use super::Configuration;
use crate::data::PriceFeed;
use crate::platforms::BettingClient;
use crate::strategy::ConfidencePolicy;
use crate::types::{
    BalanceSnapshot, Decision, Outcome, RoundError, RoundEvent, RoundPhase, Side, Stats,
};

/// Native stake precision (wei).
const STAKE_DECIMALS: u32 = 18;

// ---------------------------------------------------------------------------
// Step results
// ---------------------------------------------------------------------------

/// Why a round was given up without a bet.
#[derive(Debug, Clone, PartialEq)]
pub enum AbortReason {
    PriceUnavailable(String),
    SignalUnavailable(String),
    TransactionFailed(String),
}

impl From<RoundError> for AbortReason {
    fn from(err: RoundError) -> Self {
        match err {
            RoundError::PriceUnavailable(m) => AbortReason::PriceUnavailable(m),
            RoundError::SignalUnavailable(m) => AbortReason::SignalUnavailable(m),
            other => AbortReason::TransactionFailed(other.to_string()),
        }
    }
}

/// Result of the decision step for one round.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundStep {
    /// The round was not waiting (duplicate timer or already ended).
    Skipped,
    /// The daily goal is reached; the agent stops taking rounds.
    Halted,
    Aborted(AbortReason),
    Abstained(Decision),
    BetPlaced {
        side: Side,
        stake: Decimal,
        confidence: u8,
    },
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct RoundOrchestrator {
    config: Configuration,
    policy: ConfidencePolicy,
    ledger: RoundLedger,
    signals: SignalAggregator,
    contract: Arc<dyn BettingClient>,
    prices: Arc<dyn PriceFeed>,
    /// Native balance at startup; the baseline for fiat profit.
    starting_balance: Decimal,
    phases: BTreeMap<u64, RoundPhase>,
    timers: JoinSet<u64>,
    halted: bool,
    last_stats: Stats,
}

impl RoundOrchestrator {
    pub fn new(
        config: Configuration,
        ledger: RoundLedger,
        signals: SignalAggregator,
        contract: Arc<dyn BettingClient>,
        prices: Arc<dyn PriceFeed>,
    ) -> Self {
        // Bets left open by a previous run still get settled.
        let phases = ledger
            .open_bets()
            .into_iter()
            .map(|epoch| (epoch, RoundPhase::AwaitingSettlement))
            .collect();
        let last_stats = ledger.compute_stats(None);

        Self {
            policy: ConfidencePolicy::new(config.threshold),
            config,
            ledger,
            signals,
            contract,
            prices,
            starting_balance: Decimal::ZERO,
            phases,
            timers: JoinSet::new(),
            halted: false,
            last_stats,
        }
    }

    // -- Accessors -------------------------------------------------------

    pub fn phase(&self, epoch: u64) -> RoundPhase {
        self.phases.get(&epoch).copied().unwrap_or(RoundPhase::Idle)
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn timing(&self) -> &TimingController {
        &self.config.timing
    }

    pub fn ledger(&self) -> &RoundLedger {
        &self.ledger
    }

    pub fn last_stats(&self) -> &Stats {
        &self.last_stats
    }

    pub fn starting_balance(&self) -> Decimal {
        self.starting_balance
    }

    /// Rounds with a placed bet that have not settled yet.
    pub fn pending_settlements(&self) -> usize {
        self.phases
            .values()
            .filter(|p| **p == RoundPhase::AwaitingSettlement)
            .count()
    }

    // -- Startup ---------------------------------------------------------

    /// Record the starting balance and warn when it cannot cover a stake.
    pub async fn startup_check(&mut self) -> Result<()> {
        let balance = self
            .contract
            .balance()
            .await
            .context("Failed to read wallet balance")?;
        self.starting_balance = balance;

        match self.prices.current_price().await {
            Ok(price) if price > Decimal::ZERO => {
                let stake = self.stake_for(price);
                if balance < stake {
                    warn!(%balance, %stake, "Balance does not cover a single bet");
                } else {
                    info!(
                        %balance,
                        balance_usd = format!("${:.2}", balance * price),
                        %stake,
                        "Balance check passed"
                    );
                }
            }
            Ok(price) => warn!(%price, "Non-positive price, skipping balance check"),
            Err(e) => warn!(error = %e, "Price unavailable, skipping balance check"),
        }
        Ok(())
    }

    // -- Event loop ------------------------------------------------------

    /// Consume round events until the event source closes, `shutdown`
    /// resolves, or the agent halts and every in-flight bet has settled.
    pub async fn run<S>(mut self, mut events: mpsc::Receiver<RoundEvent>, shutdown: S) -> Stats
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("Waiting for next round...");

        loop {
            if self.halted && self.pending_settlements() == 0 {
                info!("All in-flight rounds settled after halt");
                break;
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                Some(joined) = self.timers.join_next() => match joined {
                    Ok(epoch) => {
                        self.on_wait_elapsed(epoch).await;
                    }
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => error!(error = %e, "Wait timer task failed"),
                },
                event = events.recv() => match event {
                    Some(RoundEvent::StartRound(epoch)) => {
                        self.on_start_round(epoch);
                    }
                    Some(RoundEvent::EndRound(epoch)) => {
                        self.on_end_round(epoch).await;
                    }
                    None => {
                        info!("Round event source closed");
                        break;
                    }
                },
            }
        }

        self.timers.shutdown().await;
        info!(
            stats = %self.last_stats,
            pending = self.pending_settlements(),
            "Orchestrator stopped"
        );
        self.last_stats
    }

    /// Handle `StartRound(epoch)`: schedule the decision after the current
    /// wait. Returns false when the event is ignored.
    pub fn on_start_round(&mut self, epoch: u64) -> bool {
        if self.halted {
            info!(epoch, "Halted, ignoring round start");
            return false;
        }
        if self.phases.contains_key(&epoch) || self.ledger.get(epoch).is_some() {
            warn!(epoch, "Duplicate round start ignored");
            return false;
        }

        let wait = self.config.timing.current_wait();
        self.phases.insert(epoch, RoundPhase::Waiting);
        info!(
            epoch,
            wait_minutes = format!("{:.1}", wait.as_secs_f64() / 60.0),
            "Starting round"
        );

        self.timers.spawn(async move {
            tokio::time::sleep(wait).await;
            epoch
        });
        true
    }

    /// Run the decision for a round whose wait has elapsed.
    pub async fn on_wait_elapsed(&mut self, epoch: u64) -> RoundStep {
        if self.halted {
            self.phases.remove(&epoch);
            return RoundStep::Halted;
        }
        if self.phase(epoch) != RoundPhase::Waiting {
            debug!(epoch, phase = ?self.phase(epoch), "Round no longer waiting");
            return RoundStep::Skipped;
        }
        self.phases.insert(epoch, RoundPhase::Deciding);

        let stats = self.refresh_stats().await;
        if self.goal_reached(&stats) {
            self.phases.remove(&epoch);
            self.halt(&stats);
            return RoundStep::Halted;
        }

        let price = match self.fetch_price().await {
            Ok(p) => p,
            Err(e) => return self.abort(epoch, e.into()),
        };

        let signal = match self.signals.fetch_composite().await {
            Ok(s) => s,
            Err(e) => return self.abort(epoch, e.into()),
        };

        let decision = self.policy.decide(&signal);
        let Some(side) = decision.side else {
            self.phases.remove(&epoch);
            info!(epoch, confidence = decision.confidence, %signal, "Waiting for next round");
            return RoundStep::Abstained(decision);
        };

        info!(epoch, prediction = %side, confidence = decision.confidence, "Prediction");
        self.place_bet(epoch, side, price, decision.confidence).await
    }

    /// Handle `EndRound(epoch)`: claim, settle, report stats and re-check
    /// the daily goal. Returns the refreshed stats when the round settled.
    pub async fn on_end_round(&mut self, epoch: u64) -> Option<Stats> {
        // A round still waiting when it closes can no longer be bet on.
        if self.phase(epoch) == RoundPhase::Waiting {
            warn!(epoch, "Round ended before its wait elapsed");
        }

        let open_bet = self
            .ledger
            .get(epoch)
            .filter(|r| r.has_bet() && !r.settled)
            .is_some();

        let (outcome, payout) = if open_bet {
            self.resolve_bet(epoch).await
        } else {
            (Outcome::Unknown, None)
        };

        self.phases.remove(&epoch);
        if let Err(e) = self.ledger.settle(epoch, outcome, payout) {
            debug!(epoch, error = %e, "Settlement skipped");
            return None;
        }

        let stats = self.refresh_stats().await;
        report_stats(epoch, &stats);

        if !self.halted && self.goal_reached(&stats) {
            self.halt(&stats);
        }
        Some(stats)
    }

    // -- Internals -------------------------------------------------------

    async fn place_bet(&mut self, epoch: u64, side: Side, price: Decimal, confidence: u8) -> RoundStep {
        self.phases.insert(epoch, RoundPhase::Betting);
        let stake = self.stake_for(price);

        match self.contract.place_bet(side, stake, epoch).await {
            Ok(receipt) => {
                info!(epoch, %side, %stake, tx = %receipt.tx_hash, "Successful bet");
                if let Err(e) = self.ledger.record_bet(epoch, stake, side) {
                    error!(epoch, error = %e, "Bet placed but not recorded");
                }
                self.phases.insert(epoch, RoundPhase::AwaitingSettlement);
                RoundStep::BetPlaced {
                    side,
                    stake,
                    confidence,
                }
            }
            Err(e) => {
                warn!(epoch, %side, %stake, error = %e, "Transaction error");
                self.config.timing.on_bet_failure();
                self.abort(epoch, RoundError::Transaction(format!("{e:#}")).into())
            }
        }
    }

    /// Claim if claimable. Not claimable means the bet lost.
    async fn resolve_bet(&self, epoch: u64) -> (Outcome, Option<Decimal>) {
        match self.contract.is_claimable(epoch).await {
            Ok(true) => match self.contract.claim(epoch).await {
                Ok(payout) => {
                    info!(epoch, payout = ?payout, "Payout claimed");
                    (Outcome::Win, payout)
                }
                Err(e) => {
                    let err = RoundError::Claim {
                        epoch,
                        message: format!("{e:#}"),
                    };
                    warn!(error = %err, "Won round but claim failed");
                    (Outcome::Win, None)
                }
            },
            Ok(false) => (Outcome::Loss, None),
            Err(e) => {
                warn!(epoch, error = %e, "Claimable check failed, outcome unknown");
                (Outcome::Unknown, None)
            }
        }
    }

    async fn fetch_price(&self) -> Result<Decimal, RoundError> {
        match self.prices.current_price().await {
            Ok(p) if p > Decimal::ZERO => Ok(p),
            Ok(p) => Err(RoundError::PriceUnavailable(format!("non-positive price {p}"))),
            Err(e) => Err(RoundError::PriceUnavailable(format!("{e:#}"))),
        }
    }

    async fn snapshot(&self) -> Option<BalanceSnapshot> {
        let balance = match self.contract.balance().await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "Balance unavailable for stats");
                return None;
            }
        };
        match self.fetch_price().await {
            Ok(price) => Some(BalanceSnapshot {
                balance,
                starting_balance: self.starting_balance,
                price,
            }),
            Err(e) => {
                warn!(error = %e, "Price unavailable for stats");
                None
            }
        }
    }

    /// Recompute stats. Without a snapshot the last known profit is kept.
    async fn refresh_stats(&mut self) -> Stats {
        let snapshot = self.snapshot().await;
        let mut stats = self.ledger.compute_stats(snapshot.as_ref());
        if snapshot.is_none() {
            stats.profit_fiat = self.last_stats.profit_fiat;
        }
        self.last_stats = stats.clone();
        stats
    }

    fn stake_for(&self, price: Decimal) -> Decimal {
        (self.config.bet_amount_usd / price).round_dp(STAKE_DECIMALS)
    }

    fn goal_reached(&self, stats: &Stats) -> bool {
        stats.profit_fiat >= self.config.daily_goal_usd
    }

    fn halt(&mut self, stats: &Stats) {
        self.halted = true;
        self.timers.abort_all();
        self.phases.retain(|_, p| *p == RoundPhase::AwaitingSettlement);
        info!(
            profit_usd = format!("{:.3}", stats.profit_fiat),
            goal_usd = %self.config.daily_goal_usd,
            pending = self.pending_settlements(),
            "Daily goal reached. Shutting down..."
        );
    }

    fn abort(&mut self, epoch: u64, reason: AbortReason) -> RoundStep {
        self.phases.remove(&epoch);
        warn!(epoch, reason = ?reason, "Round aborted");
        RoundStep::Aborted(reason)
    }
}

fn report_stats(epoch: u64, stats: &Stats) {
    info!(
        epoch,
        fortune = format!("{:.1}%", stats.win_percentage),
        wins = stats.win_count,
        losses = stats.loss_count,
        profit_usd = format!("{:.3}", stats.profit_fiat),
        realized_native = %stats.realized_native,
        "Round stats"
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
