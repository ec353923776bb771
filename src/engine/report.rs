//! Report rendering.
//!
//! Formats a `ScanResult` as chat text with Markdown links to a charting
//! service. The output of a failed scan is a single plain-text line.

use std::fmt::Write;

use crate::config::ReportConfig;
use crate::types::{ScanError, ScanResult, Symbol};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Builds deep links into the external charting service.
#[derive(Debug, Clone)]
pub struct ChartLinks {
    base_url: String,
    exchange: String,
}

impl ChartLinks {
    pub fn new(base_url: &str, exchange: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            exchange: exchange.to_uppercase(),
        }
    }

    /// e.g. `https://www.tradingview.com/chart/?symbol=BINANCE:BTCUSDT`
    pub fn link(&self, symbol: &Symbol) -> String {
        format!("{}{}:{}", self.base_url, self.exchange, symbol.venue_ticker())
    }
}

impl Default for ChartLinks {
    fn default() -> Self {
        Self::from(&ReportConfig::default())
    }
}

impl From<&ReportConfig> for ChartLinks {
    fn from(cfg: &ReportConfig) -> Self {
        Self::new(&cfg.chart_url, &cfg.chart_exchange)
    }
}

/// Render a scan result. Entries are assumed to be ranked already.
pub fn render(result: &ScanResult, links: &ChartLinks) -> String {
    let at = result.generated_at.format(TIMESTAMP_FORMAT);

    if result.is_empty() {
        return format!("No volume anomaly signals for {} at {at} UTC", result.timeframe);
    }

    let mut out = format!("🚨 Volume Anomaly Signals ({}) at {at} UTC:\n", result.timeframe);
    for entry in &result.entries {
        // Writing to a String cannot fail.
        let _ = writeln!(
            out,
            "- [{}]({}): +{:.2}%",
            entry.symbol,
            links.link(&entry.symbol),
            entry.score.excess_pct()
        );
    }
    out
}

/// Human-readable text for a scan that failed as a whole.
pub fn render_error(err: &ScanError) -> String {
    match err {
        ScanError::InvalidRequest(msg) => format!("Error: {msg}"),
        other => format!("Error scanning coins: {other}"),
    }
}
