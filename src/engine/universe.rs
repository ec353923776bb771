//! Universe resolution.
//!
//! Turns a requested universe (explicit symbol, market-cap top-N, or the
//! full venue listing) into the ordered list of symbols to scan. Top-N
//! intersects the market-cap ranking with the pairs the venue actually
//! trades against the reference quote currency.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::market::{MarketCapRanking, MarketInfo, MarketMetadata};
use crate::types::{ScanError, Symbol, Universe};

/// Resolves a universe into symbols. Any failure is scan-fatal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SymbolUniverse: Send + Sync {
    async fn resolve(&self, universe: &Universe) -> Result<Vec<Symbol>, ScanError>;
}

pub struct UniverseResolver {
    ranking: Arc<dyn MarketCapRanking>,
    metadata: Arc<dyn MarketMetadata>,
    quote_asset: String,
    max_ranking_pages: u32,
}

impl UniverseResolver {
    pub fn new(
        ranking: Arc<dyn MarketCapRanking>,
        metadata: Arc<dyn MarketMetadata>,
        quote_asset: &str,
        max_ranking_pages: u32,
    ) -> Self {
        Self {
            ranking,
            metadata,
            quote_asset: quote_asset.to_uppercase(),
            max_ranking_pages: max_ranking_pages.max(1),
        }
    }

    /// Tradable pairs quoted in the reference currency, in venue order.
    async fn tradable_pairs(&self) -> Result<Vec<Symbol>, ScanError> {
        let markets = self.metadata.fetch_markets().await.map_err(|e| {
            ScanError::UniverseUnavailable(format!("market metadata: {e:#}"))
        })?;

        Ok(Self::filter_quote(markets, &self.quote_asset))
    }

    fn filter_quote(markets: Vec<MarketInfo>, quote: &str) -> Vec<Symbol> {
        markets
            .into_iter()
            .filter(|m| m.trading && m.symbol.quote() == quote)
            .map(|m| m.symbol)
            .collect()
    }

    async fn resolve_top(&self, n: usize) -> Result<Vec<Symbol>, ScanError> {
        let pairs = self.tradable_pairs().await?;

        // First listed pair wins when a base appears more than once.
        let mut by_base: HashMap<String, Symbol> = HashMap::with_capacity(pairs.len());
        for symbol in pairs {
            by_base.entry(symbol.base().to_string()).or_insert(symbol);
        }

        // `n` is user input; never size a buffer from it.
        let mut selected = Vec::with_capacity(n.min(by_base.len()));
        let mut seen = HashSet::new();

        'pages: for page in 1..=self.max_ranking_pages {
            let assets = self.ranking.fetch_ranking_page(page).await.map_err(|e| {
                ScanError::UniverseUnavailable(format!("market-cap ranking page {page}: {e:#}"))
            })?;

            if assets.is_empty() {
                debug!(page, "Ranking exhausted");
                break;
            }

            for asset in assets {
                let ticker = asset.ticker.to_uppercase();
                let Some(symbol) = by_base.get(&ticker) else {
                    continue;
                };
                if seen.insert(symbol.clone()) {
                    selected.push(symbol.clone());
                }
                if selected.len() >= n {
                    break 'pages;
                }
            }
        }

        if selected.is_empty() {
            return Err(ScanError::UniverseUnavailable(
                "Failed to fetch top coins by market cap".into(),
            ));
        }
        if selected.len() < n {
            warn!(requested = n, resolved = selected.len(), "Ranking exhausted before top-N filled");
        }

        Ok(selected)
    }
}

#[async_trait]
impl SymbolUniverse for UniverseResolver {
    async fn resolve(&self, universe: &Universe) -> Result<Vec<Symbol>, ScanError> {
        let symbols = match universe {
            Universe::Explicit(symbol) => vec![symbol.clone()],
            Universe::Top(0) => {
                return Err(ScanError::InvalidRequest(
                    "Top must be a positive number or 'full'".into(),
                ))
            }
            Universe::Top(n) => self.resolve_top(*n).await?,
            Universe::Full => self.tradable_pairs().await?,
        };

        info!(universe = ?universe, count = symbols.len(), "Universe resolved");
        Ok(symbols)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
