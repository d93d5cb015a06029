//! End-to-end round scenarios.
//!
//! Drives the orchestrator with mock collaborators, both step by step and
//! through the event queue.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use prophet::engine::events::RoundClock;
use prophet::engine::ledger::RoundLedger;
use prophet::engine::orchestrator::{AbortReason, RoundOrchestrator, RoundStep};
use prophet::engine::signals::SignalAggregator;
use prophet::engine::timing::TimingController;
use prophet::engine::Configuration;
use prophet::platforms::paper::PaperPlatform;
use prophet::platforms::BettingClient;
use prophet::storage::RoundStore;
use prophet::types::{Decision, Outcome, RoundEvent, RoundPhase, Side, SignalSummary};

use crate::mock_platform::{wait_until, MockPlatform, ScriptedAnalyzer, ScriptedPriceFeed, SharedStore};

const PRICE: Decimal = dec!(500);

struct Harness {
    platform: Arc<MockPlatform>,
    prices: Arc<ScriptedPriceFeed>,
    store: SharedStore,
}

impl Harness {
    fn new(balance: Decimal) -> Self {
        Self::with_payout(balance, dec!(1.9))
    }

    fn with_payout(balance: Decimal, payout_multiplier: Decimal) -> Self {
        Self {
            platform: Arc::new(MockPlatform::new(balance, payout_multiplier)),
            prices: Arc::new(ScriptedPriceFeed::new(PRICE)),
            store: SharedStore::default(),
        }
    }

    fn orchestrator(&self, analyzer: ScriptedAnalyzer, wait_ms: u64, goal: Decimal) -> RoundOrchestrator {
        self.orchestrator_with(self.platform.clone(), analyzer, wait_ms, goal)
    }

    fn orchestrator_with(
        &self,
        contract: Arc<dyn BettingClient>,
        analyzer: ScriptedAnalyzer,
        wait_ms: u64,
        goal: Decimal,
    ) -> RoundOrchestrator {
        let config = Configuration {
            bet_amount_usd: dec!(5),
            daily_goal_usd: goal,
            threshold: 55,
            timing: TimingController::new(
                Duration::from_millis(wait_ms),
                Duration::from_millis(3_000),
                Duration::from_millis(10_000).min(Duration::from_millis(wait_ms)),
            ),
        };
        let ledger = RoundLedger::open(Box::new(self.store.clone())).unwrap();
        let signals = SignalAggregator::new(Arc::new(analyzer), "BNBUSDT", "1m", "5m");
        RoundOrchestrator::new(config, ledger, signals, contract, self.prices.clone())
    }
}

#[tokio::test]
async fn strong_signal_bets_up() {
    let h = Harness::new(dec!(1));
    let mut o = h.orchestrator(ScriptedAnalyzer::uniform(70, 30, 0), 5, dec!(3000));
    tokio_test::assert_ok!(o.startup_check().await);

    assert!(o.on_start_round(100));
    let step = o.on_wait_elapsed(100).await;

    assert_eq!(
        step,
        RoundStep::BetPlaced { side: Side::Up, stake: dec!(0.01), confidence: 70 }
    );
    let bets = h.platform.bets();
    assert_eq!(bets.len(), 1);
    assert_eq!(bets[0].side, Side::Up);
    assert_eq!(bets[0].stake, dec!(0.01));
    assert_eq!(o.phase(100), RoundPhase::AwaitingSettlement);
}

#[tokio::test]
async fn mixed_timeframes_below_threshold_abstain() {
    let h = Harness::new(dec!(1));
    let analyzer = ScriptedAnalyzer::new(
        SignalSummary { buy: 50, sell: 50, neutral: 0 },
        SignalSummary { buy: 52, sell: 48, neutral: 0 },
    );
    let mut o = h.orchestrator(analyzer, 5, dec!(3000));
    tokio_test::assert_ok!(o.startup_check().await);

    o.on_start_round(1);
    assert_eq!(o.on_wait_elapsed(1).await, RoundStep::Abstained(Decision::abstain(51)));
    assert!(h.platform.bets().is_empty());
    assert!(o.ledger().is_empty());
}

#[tokio::test]
async fn two_failed_transactions_shrink_wait_twice() {
    let h = Harness::new(dec!(1));
    h.platform.set_fail_bets(true);
    let mut o = h.orchestrator(ScriptedAnalyzer::uniform(20, 60, 6), 265_000, dec!(3000));
    tokio_test::assert_ok!(o.startup_check().await);

    let initial = o.timing().current_wait();
    for epoch in [1, 2] {
        o.on_start_round(epoch);
        let step = o.on_wait_elapsed(epoch).await;
        assert!(matches!(step, RoundStep::Aborted(AbortReason::TransactionFailed(_))));
    }

    assert_eq!(o.timing().current_wait(), initial - Duration::from_millis(12_000));
    assert!(o.ledger().is_empty());
    assert!(h.platform.bets().is_empty());
}

#[tokio::test]
async fn price_outage_skips_round_silently() {
    let h = Harness::new(dec!(1));
    let mut o = h.orchestrator(ScriptedAnalyzer::uniform(70, 30, 0), 5, dec!(3000));
    tokio_test::assert_ok!(o.startup_check().await);
    h.prices.set_fail(true);

    o.on_start_round(1);
    assert!(matches!(
        o.on_wait_elapsed(1).await,
        RoundStep::Aborted(AbortReason::PriceUnavailable(_))
    ));
    assert_eq!(o.phase(1), RoundPhase::Idle);
    assert!(o.ledger().is_empty());

    // Next round proceeds once the feed is back.
    h.prices.set_fail(false);
    o.on_start_round(2);
    assert!(matches!(o.on_wait_elapsed(2).await, RoundStep::BetPlaced { .. }));
}

#[tokio::test]
async fn settlement_records_win_loss_and_history() {
    let h = Harness::new(dec!(1));
    let mut o = h.orchestrator(ScriptedAnalyzer::uniform(70, 30, 0), 5, dec!(3000));
    tokio_test::assert_ok!(o.startup_check().await);

    for epoch in 1..=3 {
        o.on_start_round(epoch);
        o.on_wait_elapsed(epoch).await;
    }
    h.platform.set_winner(1);
    h.platform.set_winner(2);

    for epoch in 1..=3 {
        o.on_end_round(epoch).await.unwrap();
    }
    // A round that was never bet on still lands in the history.
    o.on_end_round(4).await.unwrap();

    let stats = o.last_stats().clone();
    assert_eq!(stats.win_count, 2);
    assert_eq!(stats.loss_count, 1);
    assert!((stats.win_percentage - 66.7).abs() < 0.05);
    assert_eq!(h.platform.claims(), vec![1, 2]);

    // 1 - 3 * 0.01 + 2 * 0.019 = 1.008 native, 0.008 * 500 = 4 USD.
    assert_eq!(stats.profit_fiat, dec!(4));

    let stored = h.store.load().unwrap();
    assert_eq!(stored.len(), 4);
    assert!(stored.iter().all(|r| r.settled));
    assert_eq!(stored.iter().find(|r| r.epoch == 3).unwrap().outcome, Outcome::Loss);
    assert!(stored.iter().find(|r| r.epoch == 4).unwrap().side.is_none());
}

#[tokio::test]
async fn daily_goal_halts_but_in_flight_round_settles() {
    // A 11x payout on round 1 lifts the balance to 1.09 native, i.e. a
    // 45 USD profit that crosses the 10 USD goal at that settlement.
    let h = Harness::with_payout(dec!(1), dec!(11));
    h.platform.set_winner(1);
    let mut o = h.orchestrator(ScriptedAnalyzer::uniform(70, 30, 0), 5, dec!(10));
    tokio_test::assert_ok!(o.startup_check().await);

    let (tx, rx) = mpsc::channel(16);
    let run = tokio::spawn(o.run(rx, std::future::pending::<()>()));

    tx.send(RoundEvent::StartRound(1)).await.unwrap();
    tx.send(RoundEvent::StartRound(2)).await.unwrap();
    let platform = h.platform.clone();
    assert!(wait_until(|| platform.bets().len() == 2, Duration::from_secs(2)).await);

    tx.send(RoundEvent::EndRound(1)).await.unwrap();
    tx.send(RoundEvent::StartRound(3)).await.unwrap();
    tx.send(RoundEvent::EndRound(2)).await.unwrap();

    let stats = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("orchestrator should stop after the in-flight round settles")
        .unwrap();

    assert_eq!(h.platform.bets().len(), 2, "no bet after halt");
    assert_eq!(stats.win_count, 1);
    assert_eq!(stats.loss_count, 1);
    assert_eq!(stats.profit_fiat, dec!(45));

    let stored = h.store.load().unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|r| r.settled));
    assert!(stored.iter().all(|r| r.epoch != 3));
}

#[tokio::test]
async fn shutdown_cancels_pending_wait() {
    let h = Harness::new(dec!(1));
    let o = h.orchestrator(ScriptedAnalyzer::uniform(70, 30, 0), 60_000, dec!(3000));

    let (tx, rx) = mpsc::channel(4);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let run = tokio::spawn(o.run(rx, async move {
        let _ = stop_rx.await;
    }));

    tx.send(RoundEvent::StartRound(1)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    stop_tx.send(()).unwrap();

    tokio::time::timeout(Duration::from_secs(1), run)
        .await
        .expect("shutdown should not wait for the round timer")
        .unwrap();
    assert!(h.platform.bets().is_empty());
}

#[tokio::test]
async fn duplicate_events_are_idempotent() {
    let h = Harness::new(dec!(1));
    let o = h.orchestrator(ScriptedAnalyzer::uniform(70, 30, 0), 5, dec!(3000));

    let (tx, rx) = mpsc::channel(16);
    let run = tokio::spawn(o.run(rx, std::future::pending::<()>()));

    tx.send(RoundEvent::StartRound(1)).await.unwrap();
    tx.send(RoundEvent::StartRound(1)).await.unwrap();
    let platform = h.platform.clone();
    assert!(wait_until(|| !platform.bets().is_empty(), Duration::from_secs(2)).await);
    tx.send(RoundEvent::StartRound(1)).await.unwrap();
    tx.send(RoundEvent::EndRound(1)).await.unwrap();
    tx.send(RoundEvent::EndRound(1)).await.unwrap();
    drop(tx);

    let stats = tokio::time::timeout(Duration::from_secs(2), run).await.unwrap().unwrap();
    assert_eq!(h.platform.bets().len(), 1);
    assert_eq!(stats.loss_count, 1);
    assert_eq!(h.store.load().unwrap().len(), 1);
}

#[tokio::test]
async fn restart_resumes_after_saved_history() {
    let h = Harness::new(dec!(1));

    // First run: three bets, only round 1 closes before the process stops.
    {
        let mut o = h.orchestrator(ScriptedAnalyzer::uniform(70, 30, 0), 5, dec!(3000));
        tokio_test::assert_ok!(o.startup_check().await);
        for epoch in 1..=3 {
            assert!(o.on_start_round(epoch));
            assert!(matches!(o.on_wait_elapsed(epoch).await, RoundStep::BetPlaced { .. }));
        }
        o.on_end_round(1).await.unwrap();
    }

    // Second run: the clock picks up after the saved history and closes
    // the rounds the first run left open.
    let ledger = RoundLedger::open(Box::new(h.store.clone())).unwrap();
    let first_epoch = ledger.resume_epoch(1);
    assert_eq!(first_epoch, 4);
    let clock = RoundClock::new(Duration::from_secs(300), first_epoch).with_backlog(ledger.open_bets());
    let events = clock.events_for(first_epoch);
    assert_eq!(
        events,
        vec![RoundEvent::EndRound(2), RoundEvent::EndRound(3), RoundEvent::StartRound(4)]
    );

    // A fresh paper book has no record of rounds 2 and 3.
    let paper = Arc::new(PaperPlatform::new(h.prices.clone(), dec!(1), dec!(1.9)));
    let mut o = h.orchestrator_with(paper, ScriptedAnalyzer::uniform(70, 30, 0), 5, dec!(3000));
    tokio_test::assert_ok!(o.startup_check().await);
    assert_eq!(o.pending_settlements(), 2);

    for event in events {
        match event {
            RoundEvent::EndRound(epoch) => {
                o.on_end_round(epoch).await.unwrap();
            }
            RoundEvent::StartRound(epoch) => {
                assert!(o.on_start_round(epoch), "round {epoch} should be accepted");
                assert!(matches!(o.on_wait_elapsed(epoch).await, RoundStep::BetPlaced { .. }));
            }
        }
    }

    assert_eq!(o.ledger().get(2).unwrap().outcome, Outcome::Unknown);
    assert_eq!(o.ledger().get(3).unwrap().outcome, Outcome::Unknown);
    assert_eq!(o.ledger().open_bets(), vec![4]);

    let stats = o.last_stats();
    assert_eq!(stats.win_count, 0);
    assert_eq!(stats.loss_count, 1);
}
