//! In-memory market data and messaging for integration testing.
//!
//! Deterministic implementations of the provider traits: a fixed
//! market-cap ranking, a fixed venue listing, per-symbol candle series and
//! a messenger that records everything it is asked to send.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use volscan::market::{CandleSource, MarketCapRanking, MarketInfo, MarketMetadata, RankedAsset};
use volscan::messaging::{Markup, Messenger};
use volscan::types::{Candle, CandleSeries, Recipient, Symbol, Timeframe};

/// `len` hourly candles at `base` volume, with the last one at `last`.
pub fn series(len: usize, base: f64, last: f64) -> CandleSeries {
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let candles = (0..len)
        .map(|i| {
            let volume = if i + 1 == len { last } else { base };
            Candle {
                open_time: start + Duration::hours(i as i64),
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume,
            }
        })
        .collect();
    CandleSeries::new(candles).unwrap()
}

/// Ranking, listing and candles for a handful of USDT pairs.
#[derive(Default)]
pub struct MockMarket {
    /// Tickers in market-cap order, served as a single page.
    ranking: Vec<String>,
    listing: Vec<MarketInfo>,
    candles: HashMap<String, CandleSeries>,
    /// If set, ranking and listing calls fail.
    force_error: Mutex<Option<String>>,
    candle_calls: Mutex<usize>,
}

impl MockMarket {
    pub fn new() -> Self {
        Self::default()
    }

    /// List `base`/USDT, rank it next, and serve `candles` for it.
    pub fn with_coin(mut self, base: &str, candles: CandleSeries) -> Self {
        self.ranking.push(base.to_lowercase());
        self.listing.push(MarketInfo {
            symbol: Symbol::new(base, "USDT"),
            trading: true,
        });
        self.candles.insert(base.to_uppercase(), candles);
        self
    }

    /// List a pair that is not trading (it must never be scanned).
    pub fn with_halted(mut self, base: &str) -> Self {
        self.ranking.push(base.to_lowercase());
        self.listing.push(MarketInfo {
            symbol: Symbol::new(base, "USDT"),
            trading: false,
        });
        self
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn candle_calls(&self) -> usize {
        *self.candle_calls.lock().unwrap()
    }

    fn check_error(&self) -> Result<()> {
        match self.force_error.lock().unwrap().as_ref() {
            Some(msg) => Err(anyhow!("{msg}")),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MarketCapRanking for MockMarket {
    async fn fetch_ranking_page(&self, page: u32) -> Result<Vec<RankedAsset>> {
        self.check_error()?;
        if page > 1 {
            return Ok(Vec::new());
        }
        Ok(self
            .ranking
            .iter()
            .enumerate()
            .map(|(i, ticker)| RankedAsset {
                id: ticker.clone(),
                ticker: ticker.clone(),
                rank: Some(i as u32 + 1),
            })
            .collect())
    }
}

#[async_trait]
impl MarketMetadata for MockMarket {
    async fn fetch_markets(&self) -> Result<Vec<MarketInfo>> {
        self.check_error()?;
        Ok(self.listing.clone())
    }
}

#[async_trait]
impl CandleSource for MockMarket {
    async fn fetch_candles(
        &self,
        symbol: &Symbol,
        _timeframe: Timeframe,
        _limit: usize,
    ) -> Result<CandleSeries> {
        *self.candle_calls.lock().unwrap() += 1;
        self.candles
            .get(symbol.base())
            .cloned()
            .ok_or_else(|| anyhow!("unknown symbol {symbol}"))
    }
}

/// Messenger that records every message instead of sending it.
#[derive(Default, Clone)]
pub struct RecordingMessenger {
    sent: Arc<Mutex<Vec<(Recipient, String, Markup)>>>,
    /// Recipients whose deliveries fail.
    unreachable: Arc<Mutex<Vec<Recipient>>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn make_unreachable(&self, recipient: Recipient) {
        self.unreachable.lock().unwrap().push(recipient);
    }

    pub fn sent(&self) -> Vec<(Recipient, String, Markup)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, recipient: &Recipient, text: &str, markup: Markup) -> Result<()> {
        if self.unreachable.lock().unwrap().contains(recipient) {
            return Err(anyhow!("Forbidden: bot was blocked by the user"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.clone(), text.to_string(), markup));
        Ok(())
    }
}
