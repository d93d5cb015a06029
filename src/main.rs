//! PROPHET: Autonomous Up/Down Round Prediction Agent
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores the round history, wires the collaborators and runs the
//! round orchestrator until the daily goal is reached or Ctrl+C.

use anyhow::{bail, Context, Result};
use rust_decimal::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use prophet::config::{self, AppConfig};
use prophet::data::binance::BinancePriceFeed;
use prophet::data::technical::TechnicalAnalysisClient;
use prophet::data::PriceFeed;
use prophet::engine::events::RoundClock;
use prophet::engine::ledger::RoundLedger;
use prophet::engine::orchestrator::RoundOrchestrator;
use prophet::engine::signals::SignalAggregator;
use prophet::engine::Configuration;
use prophet::platforms::paper::PaperPlatform;
use prophet::platforms::BettingClient;
use prophet::storage::{JsonFileStore, MemoryStore, RoundStore};

const BANNER: &str = r#"
 ____  ____   ___  ____  _   _ _____ _____
|  _ \|  _ \ / _ \|  _ \| | | | ____|_   _|
| |_) | |_) | | | | |_) | |_| |  _|   | |
|  __/|  _ <| |_| |  __/|  _  | |___  | |
|_|   |_| \_\\___/|_|   |_| |_|_____| |_|

  Round-driven up/down prediction agent
  v0.1.0
"#;

/// Capacity of the round event queue.
const EVENT_QUEUE: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("PROPHET_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let cfg = AppConfig::load(&config_path)?;

    init_logging(&cfg);

    println!("{BANNER}");
    info!(
        agent_name = %cfg.agent.name,
        symbol = %cfg.agent.symbol,
        bet_amount_usd = cfg.agent.bet_amount_usd,
        daily_goal_usd = cfg.agent.daily_goal_usd,
        threshold = cfg.agent.threshold,
        waiting_time_ms = cfg.agent.waiting_time_ms,
        "PROPHET starting up"
    );

    // -- Collaborators ---------------------------------------------------

    let prices: Arc<dyn PriceFeed> = Arc::new(BinancePriceFeed::new(
        &cfg.price_feed.base_url,
        &cfg.price_feed.symbol,
        cfg.price_feed.timeout_secs,
    )?);

    let analyzer = Arc::new(TechnicalAnalysisClient::new(
        &cfg.signals.base_url,
        &cfg.signals.screener,
        &cfg.signals.exchange,
        cfg.signals.timeout_secs,
    )?);
    let signals = SignalAggregator::new(
        analyzer,
        &cfg.agent.symbol,
        &cfg.signals.short_interval,
        &cfg.signals.medium_interval,
    );

    if !cfg.paper.enabled {
        bail!("No on-chain betting client is configured; set paper.enabled = true");
    }
    let contract: Arc<dyn BettingClient> = Arc::new(PaperPlatform::new(
        prices.clone(),
        Decimal::from_f64(cfg.paper.initial_balance).context("paper.initial_balance")?,
        Decimal::from_f64(cfg.paper.payout_multiplier).context("paper.payout_multiplier")?,
    ));
    info!(platform = contract.name(), "Betting client ready");

    // -- Ledger ----------------------------------------------------------

    let store: Box<dyn RoundStore> = match &cfg.storage.ledger_path {
        Some(path) => {
            let file = JsonFileStore::new(path);
            info!(path = %file.path().display(), "Round history file");
            Box::new(file)
        }
        None => Box::new(MemoryStore::new()),
    };
    let ledger = RoundLedger::open(store).context("Failed to open round ledger")?;
    let first_epoch = ledger.resume_epoch(cfg.paper.start_epoch);
    let restored = ledger.open_bets();
    info!(
        rounds = ledger.len(),
        open_bets = restored.len(),
        first_epoch,
        "Round ledger ready"
    );

    // -- Orchestrator ----------------------------------------------------

    let mut orchestrator = RoundOrchestrator::new(
        Configuration::from_agent(&cfg.agent)?,
        ledger,
        signals,
        contract,
        prices,
    );
    orchestrator.startup_check().await?;

    let (tx, rx) = mpsc::channel(EVENT_QUEUE);
    let clock = RoundClock::new(Duration::from_secs(cfg.paper.round_interval_secs), first_epoch)
        .with_backlog(restored)
        .spawn(tx);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    let stats = orchestrator.run(rx, shutdown).await;
    clock.abort();

    info!(
        fortune = format!("{:.1}%", stats.win_percentage),
        wins = stats.win_count,
        losses = stats.loss_count,
        profit_usd = format!("{:.3}", stats.profit_fiat),
        "PROPHET shut down cleanly."
    );
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging(cfg: &config::AppConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("prophet=info"));

    let json_logging = std::env::var("PROPHET_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }

    info!(agent = %cfg.agent.name, json = json_logging, "Logging initialised");
}
