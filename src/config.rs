//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (the bot token) are referenced by env-var name in the config
//! and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;

use crate::types::Timeframe;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub detector: DetectorSettings,
    pub market_data: MarketDataConfig,
    pub scheduler: SchedulerConfig,
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScannerConfig {
    /// Reference quote currency every symbol is paired against.
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,
    /// Top-N used when a request names no universe.
    #[serde(default = "default_top")]
    pub default_top: usize,
    /// Candles requested per symbol.
    #[serde(default = "default_candle_limit")]
    pub candle_limit: usize,
    /// Symbols fetched and scored concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectorSettings {
    pub recent_window: usize,
    pub ma_window: usize,
    pub threshold: f64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            recent_window: 5,
            ma_window: 20,
            threshold: 1.5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarketDataConfig {
    #[serde(default = "default_binance_url")]
    pub binance_base_url: String,
    #[serde(default = "default_coingecko_url")]
    pub coingecko_base_url: String,
    #[serde(default = "default_vs_currency")]
    pub ranking_vs_currency: String,
    #[serde(default = "default_per_page")]
    pub ranking_per_page: u32,
    #[serde(default = "default_max_pages")]
    pub max_ranking_pages: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    #[serde(default = "default_timeframes")]
    pub timeframes: Vec<Timeframe>,
    /// Minute past each hour at which broadcasts fire (UTC).
    #[serde(default)]
    pub minute: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token_env: String,
    /// Chats allowed to talk to the bot. Empty = everyone.
    #[serde(default)]
    pub allowed_chat_ids: Vec<i64>,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    pub chart_url: String,
    pub chart_exchange: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            chart_url: "https://www.tradingview.com/chart/?symbol=".into(),
            chart_exchange: "BINANCE".into(),
        }
    }
}

fn default_quote_asset() -> String {
    "USDT".into()
}
fn default_top() -> usize {
    50
}
fn default_candle_limit() -> usize {
    30
}
fn default_concurrency() -> usize {
    4
}
fn default_scan_timeout_secs() -> u64 {
    600
}
fn default_binance_url() -> String {
    "https://api.binance.com".into()
}
fn default_coingecko_url() -> String {
    "https://api.coingecko.com/api/v3".into()
}
fn default_vs_currency() -> String {
    "usd".into()
}
fn default_per_page() -> u32 {
    250
}
fn default_max_pages() -> u32 {
    4
}
fn default_request_timeout_secs() -> u64 {
    15
}
fn default_timeframes() -> Vec<Timeframe> {
    Timeframe::ALL.to_vec()
}
fn default_poll_timeout_secs() -> u64 {
    20
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config file: {path}"))
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(contents).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make every scan fail or misbehave.
    pub fn validate(&self) -> Result<()> {
        let s = &self.scanner;
        let d = &self.detector;

        anyhow::ensure!(!s.quote_asset.trim().is_empty(), "scanner.quote_asset is empty");
        anyhow::ensure!(s.default_top > 0, "scanner.default_top must be positive");
        anyhow::ensure!(s.concurrency > 0, "scanner.concurrency must be positive");
        anyhow::ensure!(s.scan_timeout_secs > 0, "scanner.scan_timeout_secs must be positive");
        anyhow::ensure!(
            d.recent_window > 0 && d.ma_window > 0,
            "detector windows must be positive"
        );
        anyhow::ensure!(
            s.candle_limit >= d.recent_window + d.ma_window,
            "scanner.candle_limit ({}) must cover recent_window + ma_window ({})",
            s.candle_limit,
            d.recent_window + d.ma_window
        );
        anyhow::ensure!(
            d.threshold.is_finite() && d.threshold > 0.0,
            "detector.threshold must be a positive number"
        );
        anyhow::ensure!(self.scheduler.minute < 60, "scheduler.minute must be 0-59");
        anyhow::ensure!(
            self.market_data.ranking_per_page > 0 && self.market_data.max_ranking_pages > 0,
            "ranking pagination must be positive"
        );
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// The Telegram bot token, read from the configured env var.
    pub fn bot_token(&self) -> Result<SecretString> {
        Self::resolve_env(&self.telegram.bot_token_env).map(SecretString::new)
    }
}
