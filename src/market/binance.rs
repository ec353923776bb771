//! Binance spot market-data integration.
//!
//! Public endpoints only, no authentication:
//! - `GET /api/v3/klines`: OHLCV candles for one symbol/interval
//! - `GET /api/v3/exchangeInfo`: every listed pair with base/quote assets
//!
//! API docs: https://developers.binance.com/docs/binance-spot-api-docs/rest-api
//! Rate limit: request-weight based (6000/min per IP); callers bound concurrency.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{CandleSource, MarketInfo, MarketMetadata};
use crate::types::{Candle, CandleSeries, Symbol, Timeframe};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Binance caps `limit` on klines at 1000.
const MAX_KLINES_LIMIT: usize = 1000;

/// Status string for pairs currently open for trading.
const STATUS_TRADING: &str = "TRADING";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    #[serde(default)]
    symbols: Vec<ExchangeSymbol>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeSymbol {
    #[serde(default)]
    status: String,
    base_asset: String,
    quote_asset: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Binance public REST client.
pub struct BinanceClient {
    http: Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("VOLSCAN/0.1.0 (volume-anomaly-scanner)")
            .build()
            .context("Failed to build HTTP client for Binance")?;

        Ok(Self {
            http,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        debug!(url = %url, "Fetching Binance endpoint");

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .context("Binance API request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error {status}: {body}");
        }

        resp.json().await.context("Failed to parse Binance response")
    }

    /// Parse a klines payload into a series.
    ///
    /// Each row is `[openTime, open, high, low, close, volume, closeTime, ...]`
    /// with prices and volume as decimal strings; trailing fields are ignored.
    fn parse_klines(payload: &Value) -> Result<CandleSeries> {
        let rows = payload
            .as_array()
            .context("klines payload is not an array")?;

        let candles = rows
            .iter()
            .enumerate()
            .map(|(i, row)| Self::parse_kline_row(row).with_context(|| format!("kline row {i}")))
            .collect::<Result<Vec<_>>>()?;

        CandleSeries::new(candles)
    }

    fn parse_kline_row(row: &Value) -> Result<Candle> {
        let fields = row.as_array().context("kline row is not an array")?;
        anyhow::ensure!(fields.len() >= 6, "kline row has {} fields, need 6", fields.len());

        let open_ms = fields[0].as_i64().context("open time is not an integer")?;

        Ok(Candle {
            open_time: Self::ms_to_datetime(open_ms)?,
            open: Self::parse_number(&fields[1]).context("open")?,
            high: Self::parse_number(&fields[2]).context("high")?,
            low: Self::parse_number(&fields[3]).context("low")?,
            close: Self::parse_number(&fields[4]).context("close")?,
            volume: Self::parse_number(&fields[5]).context("volume")?,
        })
    }

    /// Binance sends decimals as strings; accept plain numbers too.
    fn parse_number(v: &Value) -> Result<f64> {
        let n = match v {
            Value::String(s) => s
                .parse::<f64>()
                .with_context(|| format!("'{s}' is not a number"))?,
            Value::Number(n) => n.as_f64().context("number out of range")?,
            other => anyhow::bail!("expected number, got {other}"),
        };
        anyhow::ensure!(n.is_finite(), "non-finite value");
        Ok(n)
    }

    fn ms_to_datetime(ms: i64) -> Result<DateTime<Utc>> {
        Utc.timestamp_millis_opt(ms)
            .single()
            .with_context(|| format!("invalid timestamp {ms}"))
    }

    fn parse_exchange_info(payload: Value) -> Result<Vec<MarketInfo>> {
        let info: ExchangeInfo =
            serde_json::from_value(payload).context("Malformed exchangeInfo payload")?;

        Ok(info
            .symbols
            .into_iter()
            .map(|s| MarketInfo {
                symbol: Symbol::new(s.base_asset, s.quote_asset),
                trading: s.status == STATUS_TRADING,
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl CandleSource for BinanceClient {
    async fn fetch_candles(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<CandleSeries> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            urlencoding::encode(&symbol.venue_ticker()),
            timeframe.as_str(),
            limit.clamp(1, MAX_KLINES_LIMIT),
        );

        let payload = self.get_json(&url).await?;
        let series = Self::parse_klines(&payload)
            .with_context(|| format!("Malformed klines for {symbol}"))?;

        debug!(symbol = %symbol, timeframe = %timeframe, candles = series.len(), "Candles fetched");
        Ok(series)
    }
}

#[async_trait]
impl MarketMetadata for BinanceClient {
    async fn fetch_markets(&self) -> Result<Vec<MarketInfo>> {
        let url = format!("{}/api/v3/exchangeInfo", self.base_url);
        let payload = self.get_json(&url).await?;
        let markets = Self::parse_exchange_info(payload)?;
        debug!(count = markets.len(), "Binance markets loaded");
        Ok(markets)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
