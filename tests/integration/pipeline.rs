//! Full scan → rank → report → dispatch flow, wired with the real
//! resolver, orchestrator, dispatcher and scheduler.

use std::sync::Arc;

use volscan::bot::CommandBot;
use volscan::engine::detector::AnomalyDetector;
use volscan::engine::dispatcher::{self, Dispatcher};
use volscan::engine::report::ChartLinks;
use volscan::engine::scanner::{ScanOrchestrator, ScanSettings};
use volscan::engine::scheduler::{BroadcastReport, Scheduler};
use volscan::engine::universe::UniverseResolver;
use volscan::messaging::{InboundMessage, Markup};
use volscan::subscribers::SubscriberRegistry;
use volscan::types::{Recipient, ScanError, ScanRequest, Symbol, Timeframe, UniverseSelector};

use crate::mock_market::{series, MockMarket, RecordingMessenger};

struct Harness {
    market: Arc<MockMarket>,
    messenger: RecordingMessenger,
    orchestrator: Arc<ScanOrchestrator>,
    dispatcher: Arc<Dispatcher>,
}

fn harness(market: MockMarket) -> Harness {
    let market = Arc::new(market);
    let universe = Arc::new(UniverseResolver::new(market.clone(), market.clone(), "USDT", 4));
    let orchestrator = Arc::new(ScanOrchestrator::new(
        universe,
        market.clone(),
        AnomalyDetector::default(),
        ScanSettings::default(),
    ));
    let messenger = RecordingMessenger::new();
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(messenger.clone()),
        ChartLinks::default(),
    ));
    Harness {
        market,
        messenger,
        orchestrator,
        dispatcher,
    }
}

/// A is flat, B doubles its volume on the last candle.
fn two_coins() -> MockMarket {
    MockMarket::new()
        .with_coin("AAA", series(30, 100.0, 100.0))
        .with_coin("BBB", series(30, 100.0, 200.0))
}

#[tokio::test]
async fn test_top_two_reports_only_the_spike() {
    let h = harness(two_coins());
    let request = ScanRequest::new(
        None,
        Timeframe::OneHour,
        UniverseSelector::Top(2),
        Recipient::new("7"),
    );

    let result = dispatcher::manual_scan(&h.orchestrator, &h.dispatcher, &request)
        .await
        .unwrap();

    assert_eq!(result.symbols_total, 2);
    assert_eq!(result.entries.len(), 1);
    assert_eq!(result.entries[0].symbol, Symbol::new("BBB", "USDT"));
    assert!((result.entries[0].score.ratio() - 2.0).abs() < 1e-9);

    let sent = h.messenger.sent();
    assert_eq!(sent.len(), 1);
    let (to, text, markup) = &sent[0];
    assert_eq!(to, &Recipient::new("7"));
    assert_eq!(*markup, Markup::Markdown);
    assert!(text.starts_with("🚨 Volume Anomaly Signals (1h)"));
    assert!(text.contains(
        "- [BBB/USDT](https://www.tradingview.com/chart/?symbol=BINANCE:BBBUSDT): +100.00%"
    ));
    assert!(!text.contains("AAA"));
}

#[tokio::test]
async fn test_universe_failure_sends_error_and_no_report() {
    let h = harness(two_coins());
    h.market.set_error("503 Service Unavailable");
    let request = ScanRequest::new(
        None,
        Timeframe::FourHours,
        UniverseSelector::Default,
        Recipient::new("7"),
    );

    let err = dispatcher::manual_scan(&h.orchestrator, &h.dispatcher, &request)
        .await
        .unwrap_err();

    assert!(matches!(err, ScanError::UniverseUnavailable(_)));
    assert_eq!(h.market.candle_calls(), 0);
    let sent = h.messenger.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.starts_with("Error scanning coins:"));
    assert!(!sent[0].1.contains("Volume Anomaly Signals"));
}

#[tokio::test]
async fn test_halted_pairs_are_never_scanned() {
    let market = MockMarket::new()
        .with_halted("OLD")
        .with_coin("AAA", series(30, 100.0, 100.0));
    let h = harness(market);
    let request = ScanRequest::new(None, Timeframe::OneDay, UniverseSelector::Full, Recipient::new("1"));

    let result = h.orchestrator.run_scan(&request).await.unwrap();
    assert_eq!(result.symbols_total, 1);
    assert!(result.entries.is_empty());
    assert_eq!(h.market.candle_calls(), 1);
}

#[tokio::test]
async fn test_short_history_is_skipped_not_fatal() {
    let market = MockMarket::new()
        .with_coin("NEW", series(8, 100.0, 900.0))
        .with_coin("BBB", series(30, 100.0, 300.0));
    let h = harness(market);
    let request = ScanRequest::new(None, Timeframe::OneHour, UniverseSelector::Full, Recipient::new("1"));

    let result = h.orchestrator.run_scan(&request).await.unwrap();
    assert_eq!(result.symbols_skipped, 1);
    assert_eq!(result.entries.len(), 1);
    assert_eq!(result.entries[0].symbol.base(), "BBB");
}

#[tokio::test]
async fn test_broadcast_reaches_every_subscriber_once() {
    let h = harness(two_coins());
    let registry = SubscriberRegistry::new();
    assert!(registry.register(Recipient::new("1")).await);
    assert!(!registry.register(Recipient::new("1")).await);
    registry.register(Recipient::new("2")).await;
    registry.register(Recipient::new("3")).await;
    assert_eq!(registry.len().await, 3);
    h.messenger.make_unreachable(Recipient::new("2"));

    let scheduler = Scheduler::new(
        h.orchestrator.clone(),
        h.dispatcher.clone(),
        registry,
        vec![Timeframe::OneHour],
        0,
    );
    let report = scheduler.broadcast(Timeframe::OneHour).await;

    assert_eq!(report, BroadcastReport { delivered: 2, failed: 1 });
    let recipients: Vec<String> = h
        .messenger
        .sent()
        .into_iter()
        .map(|(r, _, _)| r.to_string())
        .collect();
    assert_eq!(recipients, vec!["1", "3"]);
}

#[tokio::test]
async fn test_scan_command_end_to_end() {
    let h = harness(two_coins());
    let registry = SubscriberRegistry::new();
    let bot = CommandBot::new(
        Arc::new(NoUpdates),
        h.dispatcher.clone(),
        h.orchestrator.clone(),
        registry.clone(),
        Vec::new(),
        "USDT",
        vec![Timeframe::OneHour],
    );

    let request = bot
        .handle_message(InboundMessage {
            update_id: 1,
            chat_id: Some(99),
            text: Some("/scan bbb 1h full".into()),
        })
        .await
        .unwrap();
    assert!(registry.contains(&Recipient::from(99)).await);

    let result = dispatcher::manual_scan(&h.orchestrator, &h.dispatcher, &request)
        .await
        .unwrap();
    assert_eq!(result.entries.len(), 1);

    let sent = h.messenger.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].1.starts_with("Scanning volume anomalies for BBB/USDT on 1h"));
    assert!(sent[1].1.contains("BBB/USDT"));
}

struct NoUpdates;

#[async_trait::async_trait]
impl volscan::messaging::UpdateSource for NoUpdates {
    async fn poll(&self, _offset: Option<i64>) -> anyhow::Result<Vec<InboundMessage>> {
        Ok(Vec::new())
    }
}
