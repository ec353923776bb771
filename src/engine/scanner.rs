//! Volume-anomaly scan orchestrator.
//!
//! Resolves the universe for a request, fetches candles for every symbol
//! with bounded concurrency, scores each series, and returns the anomalous
//! symbols ranked by score. A symbol whose data cannot be fetched or is too
//! short is skipped; only universe resolution can fail a scan.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::detector::AnomalyDetector;
use crate::engine::universe::SymbolUniverse;
use crate::market::CandleSource;
use crate::types::{ScanEntry, ScanError, ScanRequest, ScanResult, Symbol, Timeframe};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ScanSettings {
    /// Top-N used for `UniverseSelector::Default`.
    pub default_top: usize,
    /// Candles requested per symbol.
    pub candle_limit: usize,
    /// Maximum candle fetches in flight at once, across every running scan.
    pub concurrency: usize,
    /// Upper bound on one whole scan.
    pub scan_timeout: Duration,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            default_top: 50,
            candle_limit: 30,
            concurrency: 4,
            scan_timeout: Duration::from_secs(600),
        }
    }
}

/// Per-symbol outcome, only used for accounting.
enum SymbolOutcome {
    Anomalous(ScanEntry),
    Normal,
    Skipped,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct ScanOrchestrator {
    universe: Arc<dyn SymbolUniverse>,
    candles: Arc<dyn CandleSource>,
    detector: AnomalyDetector,
    settings: ScanSettings,
    /// Shared by all scans so concurrent scans cannot multiply provider load.
    fetch_permits: Arc<Semaphore>,
}

impl ScanOrchestrator {
    pub fn new(
        universe: Arc<dyn SymbolUniverse>,
        candles: Arc<dyn CandleSource>,
        detector: AnomalyDetector,
        settings: ScanSettings,
    ) -> Self {
        let fetch_permits = Arc::new(Semaphore::new(settings.concurrency.max(1)));
        Self {
            universe,
            candles,
            detector,
            settings,
            fetch_permits,
        }
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Run one scan. Dropping the returned future cancels it.
    pub async fn run_scan(&self, request: &ScanRequest) -> Result<ScanResult, ScanError> {
        request.validate()?;

        let scan_id = Uuid::new_v4();
        let universe = request.universe(self.settings.default_top);
        info!(
            %scan_id,
            timeframe = %request.timeframe,
            universe = ?universe,
            recipient = %request.recipient,
            "Starting volume scan"
        );

        let symbols = self.universe.resolve(&universe).await?;
        let symbols_total = symbols.len();
        let timeframe = request.timeframe;

        let this = self;
        let outcomes: Vec<SymbolOutcome> = stream::iter(symbols)
            .map(move |symbol| this.scan_symbol(symbol, timeframe))
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let mut entries = Vec::new();
        let mut symbols_skipped = 0;
        for outcome in outcomes {
            match outcome {
                SymbolOutcome::Anomalous(entry) => entries.push(entry),
                SymbolOutcome::Normal => {}
                SymbolOutcome::Skipped => symbols_skipped += 1,
            }
        }

        rank(&mut entries);

        info!(
            %scan_id,
            timeframe = %timeframe,
            scanned = symbols_total,
            skipped = symbols_skipped,
            anomalies = entries.len(),
            "Volume scan complete"
        );

        Ok(ScanResult {
            timeframe,
            generated_at: Utc::now(),
            entries,
            symbols_total,
            symbols_skipped,
        })
    }

    /// `run_scan` bounded by the configured scan timeout.
    pub async fn run_scan_bounded(&self, request: &ScanRequest) -> Result<ScanResult, ScanError> {
        let limit = self.settings.scan_timeout;
        tokio::time::timeout(limit, self.run_scan(request))
            .await
            .unwrap_or(Err(ScanError::ScanTimedOut {
                secs: limit.as_secs(),
            }))
    }

    async fn scan_symbol(&self, symbol: Symbol, timeframe: Timeframe) -> SymbolOutcome {
        let fetched = match self.fetch_permits.acquire().await {
            Ok(_permit) => {
                self.candles
                    .fetch_candles(&symbol, timeframe, self.settings.candle_limit)
                    .await
            }
            Err(e) => Err(anyhow::anyhow!("fetch limiter closed: {e}")),
        };
        let series = match fetched {
            Ok(series) => series,
            Err(e) => {
                let err = ScanError::DataUnavailable {
                    symbol: symbol.to_string(),
                    reason: format!("{e:#}"),
                };
                warn!(error = %err, "Skipping symbol");
                return SymbolOutcome::Skipped;
            }
        };

        if series.len() < self.detector.min_candles() {
            debug!(
                symbol = %symbol,
                candles = series.len(),
                required = self.detector.min_candles(),
                "Series too short, skipping"
            );
            return SymbolOutcome::Skipped;
        }

        let score = self.detector.score(&series);
        if score.is_anomalous() {
            debug!(symbol = %symbol, score = %score, "Volume anomaly");
            SymbolOutcome::Anomalous(ScanEntry { symbol, score })
        } else {
            SymbolOutcome::Normal
        }
    }
}

/// Sort descending by score.
fn rank(entries: &mut [ScanEntry]) {
    entries.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
