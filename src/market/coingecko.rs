//! CoinGecko market-cap ranking.
//!
//! API: `GET /coins/markets?vs_currency=usd&order=market_cap_desc`
//! Auth: none on the public tier. Rate limit: ~10-30 req/min, so the
//! resolver only pages as far as it needs to.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{MarketCapRanking, RankedAsset};

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Debug, Deserialize)]
struct CoinMarket {
    id: String,
    symbol: String,
    #[serde(default)]
    market_cap_rank: Option<u32>,
}

/// CoinGecko public REST client.
pub struct CoinGeckoClient {
    http: Client,
    base_url: String,
    vs_currency: String,
    per_page: u32,
}

impl CoinGeckoClient {
    pub fn new(
        base_url: Option<String>,
        vs_currency: &str,
        per_page: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("VOLSCAN/0.1.0")
            .build()
            .context("Failed to build CoinGecko HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            vs_currency: vs_currency.to_lowercase(),
            per_page: per_page.clamp(1, 250),
        })
    }

    fn page_url(&self, page: u32) -> String {
        format!(
            "{}/coins/markets?vs_currency={}&order=market_cap_desc&per_page={}&page={}&sparkline=false",
            self.base_url,
            urlencoding::encode(&self.vs_currency),
            self.per_page,
            page,
        )
    }

    fn parse_page(body: &str) -> Result<Vec<RankedAsset>> {
        let coins: Vec<CoinMarket> =
            serde_json::from_str(body).context("Failed to parse CoinGecko markets response")?;

        Ok(coins
            .into_iter()
            .map(|c| RankedAsset {
                id: c.id,
                ticker: c.symbol,
                rank: c.market_cap_rank,
            })
            .collect())
    }
}

#[async_trait]
impl MarketCapRanking for CoinGeckoClient {
    async fn fetch_ranking_page(&self, page: u32) -> Result<Vec<RankedAsset>> {
        let url = self.page_url(page);
        debug!(url = %url, "Fetching CoinGecko ranking page");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("CoinGecko API request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("CoinGecko API error {status}: {body}");
        }

        let body = resp.text().await.context("Failed to read CoinGecko response")?;
        Self::parse_page(&body)
    }
}
