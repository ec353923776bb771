//! Market-data integrations.
//!
//! Defines the provider traits the scan pipeline depends on and the
//! concrete HTTP clients behind them:
//! - Binance: OHLCV candles and venue market metadata
//! - CoinGecko: market-cap ranking

pub mod binance;
pub mod coingecko;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{CandleSeries, Symbol, Timeframe};

/// Source of OHLCV candle series.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Fetch up to `limit` most recent candles. One network call, no caching.
    async fn fetch_candles(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<CandleSeries>;
}

/// One entry of a market-cap ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedAsset {
    /// Provider-specific asset id (e.g. `bitcoin`).
    pub id: String,
    /// Ticker as the provider reports it (e.g. `btc`).
    pub ticker: String,
    pub rank: Option<u32>,
}

/// Assets ordered by descending market capitalisation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketCapRanking: Send + Sync {
    /// Fetch one page (1-based). An empty page means the ranking is exhausted.
    async fn fetch_ranking_page(&self, page: u32) -> Result<Vec<RankedAsset>>;
}

/// One pair listed on the trading venue.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketInfo {
    pub symbol: Symbol,
    /// Whether the venue currently accepts orders on this pair.
    pub trading: bool,
}

/// Venue market metadata.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketMetadata: Send + Sync {
    /// Every pair the venue lists, in venue order.
    async fn fetch_markets(&self) -> Result<Vec<MarketInfo>>;
}
