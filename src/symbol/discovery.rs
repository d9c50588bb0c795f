//! Pair discovery
//!
//! Computes the working set from an external market-cap ranking and the
//! exchange's tradable symbol list. Any fetch failure leaves the previous
//! working set untouched; the refresh never raises to its caller.

use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::DiscoverySettings;
use crate::symbol::PairUniverse;

/// One entry of the market-cap ranking response.
#[derive(Debug, Deserialize)]
struct RankedCoin {
    symbol: String,
}

/// Exchange tradable-symbols response.
#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<ExchangeSymbol>,
}

/// One tradable symbol as reported by the exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeSymbol {
    pub symbol: String,
    pub status: String,
    #[serde(rename = "baseAsset")]
    pub base_asset: String,
    #[serde(rename = "quoteAsset")]
    pub quote_asset: String,
}

/// Pair discovery service
pub struct PairDiscovery {
    settings: DiscoverySettings,
    http: reqwest::Client,
    universe: Arc<PairUniverse>,
}

impl PairDiscovery {
    pub fn new(settings: &DiscoverySettings, universe: Arc<PairUniverse>) -> Self {
        Self {
            settings: settings.clone(),
            http: reqwest::Client::new(),
            universe,
        }
    }

    /// Recompute the working set and replace it wholesale.
    ///
    /// Both sources must respond for the intersection to be recomputed;
    /// otherwise the prior set is retained and the failure logged.
    pub async fn refresh_pairs(&self) {
        let ranked = match self.fetch_ranking().await {
            Ok(ranked) => ranked,
            Err(e) => {
                warn!("ranking fetch failed, keeping current working set: {}", e);
                return;
            }
        };

        let tradable = match self.fetch_tradable().await {
            Ok(tradable) => tradable,
            Err(e) => {
                warn!(
                    "exchange info fetch failed, keeping current working set: {}",
                    e
                );
                return;
            }
        };

        let pairs = compute_working_set(
            &ranked,
            &tradable,
            &self.settings.quote_asset,
            self.universe.fallback(),
            self.settings.pair_limit,
        );

        info!(
            "discovery refreshed: {} ranked assets, {} tradable symbols -> {} pairs",
            ranked.len(),
            tradable.len(),
            pairs.len()
        );
        self.universe.replace(pairs);
    }

    /// Periodic refresh loop. The initial refresh is driven by the caller.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.settings.refresh_interval());
        // The first tick fires immediately; consume it so the loop waits a
        // full interval after the startup refresh.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.refresh_pairs().await;
                }
                _ = shutdown_rx.recv() => {
                    info!("discovery loop stopping");
                    return;
                }
            }
        }
    }

    async fn fetch_ranking(&self) -> reqwest::Result<Vec<String>> {
        let url = format!(
            "{}?vs_currency=usd&order=market_cap_desc&per_page={}&page=1",
            self.settings.ranking_url, self.settings.top_n
        );

        let coins: Vec<RankedCoin> = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(coins
            .into_iter()
            .map(|c| c.symbol.to_uppercase())
            .collect())
    }

    async fn fetch_tradable(&self) -> reqwest::Result<Vec<ExchangeSymbol>> {
        let info: ExchangeInfo = self
            .http
            .get(&self.settings.exchange_info_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(info.symbols)
    }
}

/// Intersect ranked assets with tradable symbols, union the fallback list,
/// truncate to `limit`.
///
/// Ranked order is preserved so truncation keeps the top of the ranking;
/// output contains no duplicates and is uppercase.
pub fn compute_working_set(
    ranked: &[String],
    tradable: &[ExchangeSymbol],
    quote_asset: &str,
    fallback: &[String],
    limit: usize,
) -> Vec<String> {
    let mut pairs: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for base in ranked {
        let eligible = tradable.iter().find(|s| {
            s.base_asset.eq_ignore_ascii_case(base)
                && s.quote_asset == quote_asset
                && s.status == "TRADING"
        });

        if let Some(symbol) = eligible {
            let pair = symbol.symbol.to_uppercase();
            if seen.insert(pair.clone()) {
                pairs.push(pair);
            }
        }
    }

    for pair in fallback {
        let pair = pair.to_uppercase();
        if seen.insert(pair.clone()) {
            pairs.push(pair);
        }
    }

    pairs.truncate(limit);
    pairs
}
