//! VOLSCAN: crypto volume-anomaly scanner
//!
//! Entry point. Loads configuration, initialises structured logging, wires
//! the market-data clients, scan pipeline and Telegram channel together,
//! then runs the hourly scheduler and the command poller until Ctrl+C.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use volscan::bot::CommandBot;
use volscan::config;
use volscan::engine::detector::{AnomalyDetector, DetectorConfig};
use volscan::engine::dispatcher::Dispatcher;
use volscan::engine::report::ChartLinks;
use volscan::engine::scanner::{ScanOrchestrator, ScanSettings};
use volscan::engine::scheduler::Scheduler;
use volscan::engine::universe::UniverseResolver;
use volscan::market::binance::BinanceClient;
use volscan::market::coingecko::CoinGeckoClient;
use volscan::messaging::telegram::TelegramClient;
use volscan::subscribers::SubscriberRegistry;

const BANNER: &str = r#"
__     _____  _     ____   ____    _    _   _
\ \   / / _ \| |   / ___| / ___|  / \  | \ | |
 \ \ / / | | | |   \___ \| |     / _ \ |  \| |
  \ V /| |_| | |___ ___) | |___ / ___ \| |\  |
   \_/  \___/|_____|____/ \____/_/   \_\_| \_|

  Volume anomaly scanner
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;
    init_logging();

    println!("{BANNER}");
    info!(
        quote = %cfg.scanner.quote_asset,
        default_top = cfg.scanner.default_top,
        concurrency = cfg.scanner.concurrency,
        scheduler = cfg.scheduler.enabled,
        "VOLSCAN starting up"
    );

    // -- Initialise components -------------------------------------------

    let request_timeout = Duration::from_secs(cfg.market_data.request_timeout_secs);

    let binance = Arc::new(BinanceClient::new(
        Some(cfg.market_data.binance_base_url.clone()),
        request_timeout,
    )?);
    let coingecko = Arc::new(CoinGeckoClient::new(
        Some(cfg.market_data.coingecko_base_url.clone()),
        &cfg.market_data.ranking_vs_currency,
        cfg.market_data.ranking_per_page,
        request_timeout,
    )?);

    let universe = Arc::new(UniverseResolver::new(
        coingecko,
        binance.clone(),
        &cfg.scanner.quote_asset,
        cfg.market_data.max_ranking_pages,
    ));

    let orchestrator = Arc::new(ScanOrchestrator::new(
        universe,
        binance,
        AnomalyDetector::new(DetectorConfig::from(&cfg.detector)),
        ScanSettings {
            default_top: cfg.scanner.default_top,
            candle_limit: cfg.scanner.candle_limit,
            concurrency: cfg.scanner.concurrency,
            scan_timeout: Duration::from_secs(cfg.scanner.scan_timeout_secs),
        },
    ));

    let telegram = Arc::new(TelegramClient::new(
        cfg.bot_token()?,
        request_timeout,
        cfg.telegram.poll_timeout_secs,
    )?);
    let dispatcher = Arc::new(Dispatcher::new(
        telegram.clone(),
        ChartLinks::from(&cfg.report),
    ));
    let registry = SubscriberRegistry::new();

    let scheduled = if cfg.scheduler.enabled {
        cfg.scheduler.timeframes.clone()
    } else {
        Vec::new()
    };

    // -- Run -------------------------------------------------------------

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler_task = if scheduled.is_empty() {
        warn!("Scheduled broadcasts disabled");
        None
    } else {
        let scheduler = Arc::new(Scheduler::new(
            orchestrator.clone(),
            dispatcher.clone(),
            registry.clone(),
            scheduled.clone(),
            cfg.scheduler.minute,
        ));
        Some(tokio::spawn(scheduler.run(shutdown_rx.clone())))
    };

    let bot = Arc::new(CommandBot::new(
        telegram,
        dispatcher,
        orchestrator,
        registry,
        cfg.telegram.allowed_chat_ids.iter().copied(),
        &cfg.scanner.quote_asset,
        scheduled,
    ));
    let bot_task = tokio::spawn(bot.run(shutdown_rx));

    info!("Bot is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received.");

    let _ = shutdown_tx.send(true);
    if let Some(task) = scheduler_task {
        if let Err(e) = task.await {
            error!(error = %e, "Scheduler task failed");
        }
    }
    if let Err(e) = bot_task.await {
        error!(error = %e, "Command poller task failed");
    }

    info!("VOLSCAN shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("volscan=info"));

    let json_logging = std::env::var("VOLSCAN_LOG_JSON").is_ok();

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
}
