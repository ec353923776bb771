//! Shared types for the VOLSCAN pipeline.
//!
//! These types form the data model used across all modules.
//! Provider clients, the engine and the chat front end all speak in
//! terms of `Symbol`, `Timeframe`, `CandleSeries` and `ScanResult`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Symbol
// ---------------------------------------------------------------------------

/// A tradable pair (base asset + quote asset).
///
/// Displayed as `BASE/QUOTE`; the venue form has no separator (`BASEQUOTE`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol {
    base: String,
    quote: String,
}

impl Symbol {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            quote: quote.into().to_uppercase(),
        }
    }

    /// Normalise user input into a symbol quoted in `quote`.
    ///
    /// Accepts `btc`, `BTCUSDT`, `BTC/USDT` and `btc-usdt`; a missing
    /// quote suffix is appended.
    pub fn parse(input: &str, quote: &str) -> Result<Self, ScanError> {
        let quote = quote.to_uppercase();
        let cleaned: String = input
            .trim()
            .to_uppercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        if cleaned.is_empty() {
            return Err(ScanError::InvalidRequest(format!(
                "'{input}' is not a valid symbol"
            )));
        }

        let base = match cleaned.strip_suffix(quote.as_str()) {
            Some(base) if !base.is_empty() => base.to_string(),
            _ => cleaned.clone(),
        };

        Ok(Self { base, quote })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Exchange ticker without separator, e.g. `BTCUSDT`.
    pub fn venue_ticker(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

// ---------------------------------------------------------------------------
// Timeframe
// ---------------------------------------------------------------------------

/// Candle interval accepted by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "1d")]
    OneDay,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [
        Timeframe::OneHour,
        Timeframe::FourHours,
        Timeframe::TwelveHours,
        Timeframe::OneDay,
    ];

    /// Interval string understood by the market-data provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneHour => "1h",
            Timeframe::FourHours => "4h",
            Timeframe::TwelveHours => "12h",
            Timeframe::OneDay => "1d",
        }
    }

    /// Comma-separated list of accepted values, for error messages.
    pub fn allowed() -> String {
        Self::ALL
            .iter()
            .map(|tf| tf.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tf| tf.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                ScanError::InvalidRequest(format!(
                    "Invalid timeframe. Use: {}",
                    Self::allowed()
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Candles
// ---------------------------------------------------------------------------

/// One OHLCV bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Candles ordered by strictly increasing `open_time`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Build a series, rejecting out-of-order or duplicate timestamps.
    pub fn new(candles: Vec<Candle>) -> anyhow::Result<Self> {
        if let Some(pair) = candles
            .windows(2)
            .find(|w| w[1].open_time <= w[0].open_time)
        {
            anyhow::bail!(
                "candle timestamps not strictly increasing: {} then {}",
                pair[0].open_time,
                pair[1].open_time
            );
        }
        Ok(Self { candles })
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }
}

// ---------------------------------------------------------------------------
// Anomaly score
// ---------------------------------------------------------------------------

/// Current volume divided by trailing average volume. Zero means "not anomalous".
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct AnomalyScore(f64);

impl AnomalyScore {
    pub const NONE: AnomalyScore = AnomalyScore(0.0);

    /// Negative and non-finite ratios collapse to zero.
    pub fn new(ratio: f64) -> Self {
        if ratio.is_finite() && ratio > 0.0 {
            Self(ratio)
        } else {
            Self::NONE
        }
    }

    pub fn ratio(&self) -> f64 {
        self.0
    }

    pub fn is_anomalous(&self) -> bool {
        self.0 > 0.0
    }

    /// Volume excess over the trailing average, in percent.
    pub fn excess_pct(&self) -> f64 {
        (self.0 - 1.0) * 100.0
    }
}

impl fmt::Display for AnomalyScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}x", self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Opaque delivery destination (a chat id for the Telegram channel).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Recipient(String);

impl Recipient {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for Recipient {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Scan request / result
// ---------------------------------------------------------------------------

/// Which universe the caller asked for when no explicit symbol is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UniverseSelector {
    /// Configured default top-N.
    #[default]
    Default,
    Top(usize),
    Full,
}

impl fmt::Display for UniverseSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniverseSelector::Default => f.write_str("default"),
            UniverseSelector::Top(n) => write!(f, "top {n}"),
            UniverseSelector::Full => f.write_str("full"),
        }
    }
}

/// Resolved universe description handed to the Universe Resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Universe {
    Explicit(Symbol),
    Top(usize),
    Full,
}

/// One scan invocation. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub symbol: Option<Symbol>,
    pub timeframe: Timeframe,
    pub selector: UniverseSelector,
    pub recipient: Recipient,
}

impl ScanRequest {
    pub fn new(
        symbol: Option<Symbol>,
        timeframe: Timeframe,
        selector: UniverseSelector,
        recipient: Recipient,
    ) -> Self {
        Self {
            symbol,
            timeframe,
            selector,
            recipient,
        }
    }

    /// Scheduled broadcast request: default universe, no explicit symbol.
    pub fn scheduled(timeframe: Timeframe, recipient: Recipient) -> Self {
        Self::new(None, timeframe, UniverseSelector::Default, recipient)
    }

    /// Reject malformed parameters before any network call.
    pub fn validate(&self) -> Result<(), ScanError> {
        if let UniverseSelector::Top(0) = self.selector {
            return Err(ScanError::InvalidRequest(
                "Top must be a positive number or 'full'".into(),
            ));
        }
        Ok(())
    }

    /// The universe to resolve. An explicit symbol overrides the selector.
    pub fn universe(&self, default_top: usize) -> Universe {
        match (&self.symbol, self.selector) {
            (Some(symbol), _) => Universe::Explicit(symbol.clone()),
            (None, UniverseSelector::Full) => Universe::Full,
            (None, UniverseSelector::Top(n)) => Universe::Top(n),
            (None, UniverseSelector::Default) => Universe::Top(default_top),
        }
    }
}

/// One anomalous symbol in a scan result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanEntry {
    pub symbol: Symbol,
    pub score: AnomalyScore,
}

/// Ranked output of one scan, descending by score.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub timeframe: Timeframe,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<ScanEntry>,
    /// Symbols in the resolved universe.
    pub symbols_total: usize,
    /// Symbols skipped for missing or undersized data.
    pub symbols_skipped: usize,
}

impl ScanResult {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failure taxonomy of the scan pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScanError {
    #[error("Data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("Universe unavailable: {0}")]
    UniverseUnavailable(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Delivery to {recipient} failed: {reason}")]
    DeliveryFailed { recipient: String, reason: String },

    #[error("Scan timed out after {secs}s")]
    ScanTimedOut { secs: u64 },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // -- Symbol tests --

    #[test]
    fn test_symbol_parse_appends_quote() {
        let s = Symbol::parse("btc", "USDT").unwrap();
        assert_eq!(s.base(), "BTC");
        assert_eq!(s.quote(), "USDT");
        assert_eq!(s.to_string(), "BTC/USDT");
    }

    #[test]
    fn test_symbol_parse_accepts_venue_and_slash_forms() {
        let expected = Symbol::new("ETH", "USDT");
        assert_eq!(Symbol::parse("ETHUSDT", "USDT").unwrap(), expected);
        assert_eq!(Symbol::parse("eth/usdt", "USDT").unwrap(), expected);
        assert_eq!(Symbol::parse(" eth-usdt ", "usdt").unwrap(), expected);
    }

    #[test]
    fn test_symbol_parse_quote_only_is_base() {
        // "USDT" alone is treated as a base asset, not an empty base
        let s = Symbol::parse("USDT", "USDT").unwrap();
        assert_eq!(s.venue_ticker(), "USDTUSDT");
    }

    #[test]
    fn test_symbol_parse_rejects_empty() {
        assert!(matches!(
            Symbol::parse(" / ", "USDT"),
            Err(ScanError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_venue_ticker() {
        assert_eq!(Symbol::new("sol", "usdt").venue_ticker(), "SOLUSDT");
    }

    // -- Timeframe tests --

    #[test]
    fn test_timeframe_from_str() {
        assert_eq!("1h".parse::<Timeframe>().unwrap(), Timeframe::OneHour);
        assert_eq!("4H".parse::<Timeframe>().unwrap(), Timeframe::FourHours);
        assert_eq!("12h".parse::<Timeframe>().unwrap(), Timeframe::TwelveHours);
        assert_eq!("1d".parse::<Timeframe>().unwrap(), Timeframe::OneDay);
        assert!("15m".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_timeframe_error_lists_allowed() {
        let err = "2h".parse::<Timeframe>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid timeframe. Use: 1h, 4h, 12h, 1d");
    }

    #[test]
    fn test_timeframe_deserialize() {
        let tfs: Vec<Timeframe> = serde_json::from_str(r#"["1h","1d"]"#).unwrap();
        assert_eq!(tfs, vec![Timeframe::OneHour, Timeframe::OneDay]);
    }

    // -- CandleSeries tests --

    fn candle(ts_secs: i64, volume: f64) -> Candle {
        Candle {
            open_time: Utc.timestamp_opt(ts_secs, 0).unwrap(),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume,
        }
    }

    #[test]
    fn test_series_accepts_increasing() {
        let series = CandleSeries::new(vec![candle(0, 1.0), candle(60, 2.0)]).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.volumes(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_series_rejects_duplicate_timestamp() {
        assert!(CandleSeries::new(vec![candle(60, 1.0), candle(60, 2.0)]).is_err());
        assert!(CandleSeries::new(vec![candle(120, 1.0), candle(60, 2.0)]).is_err());
    }

    // -- AnomalyScore tests --

    #[test]
    fn test_score_excess_pct() {
        let s = AnomalyScore::new(2.5);
        assert!(s.is_anomalous());
        assert!((s.excess_pct() - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_non_finite_is_none() {
        assert_eq!(AnomalyScore::new(f64::NAN), AnomalyScore::NONE);
        assert_eq!(AnomalyScore::new(f64::INFINITY), AnomalyScore::NONE);
        assert_eq!(AnomalyScore::new(-3.0), AnomalyScore::NONE);
    }

    // -- ScanRequest tests --

    #[test]
    fn test_request_rejects_zero_top() {
        let req = ScanRequest::new(
            None,
            Timeframe::OneHour,
            UniverseSelector::Top(0),
            Recipient::from(1),
        );
        assert!(matches!(req.validate(), Err(ScanError::InvalidRequest(_))));
    }

    #[test]
    fn test_request_universe_resolution() {
        let r = Recipient::from(1);
        let btc = Symbol::new("BTC", "USDT");

        let explicit = ScanRequest::new(
            Some(btc.clone()),
            Timeframe::OneHour,
            UniverseSelector::Full,
            r.clone(),
        );
        assert_eq!(explicit.universe(50), Universe::Explicit(btc));

        let default = ScanRequest::scheduled(Timeframe::FourHours, r.clone());
        assert_eq!(default.universe(50), Universe::Top(50));

        let full = ScanRequest::new(None, Timeframe::OneDay, UniverseSelector::Full, r);
        assert_eq!(full.universe(50), Universe::Full);
    }
}
