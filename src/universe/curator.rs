//! Token universe curation.
//!
//! Filters the raw market snapshot down to the symbols surviving the
//! external classification step, deduplicates it, and ranks it by
//! market capitalization. The result is the bounded candidate list the
//! momentum estimator scans.

use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::{debug, info};

use crate::types::MarketToken;

/// Curated candidates, deduplicated and sorted by descending market cap.
pub type CuratedUniverse = Vec<MarketToken>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CuratorConfig {
    /// Number of candidates kept before signal computation.
    pub candidate_limit: usize,
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self { candidate_limit: 15 }
    }
}

// ---------------------------------------------------------------------------
// Curator
// ---------------------------------------------------------------------------

pub struct Curator {
    config: CuratorConfig,
}

impl Curator {
    pub fn new(config: CuratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CuratorConfig {
        &self.config
    }

    /// Build the candidate list from a snapshot.
    ///
    /// With a reduced list, only symbols present in it (and not merely a
    /// longer variant of another listed symbol) survive. Without one the
    /// whole snapshot passes through.
    pub fn curate(&self, tokens: &[MarketToken], reduced: Option<&[String]>) -> CuratedUniverse {
        let reduced: Option<Vec<&str>> = reduced.map(|list| {
            list.iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect()
        });

        let mut kept: Vec<MarketToken> = tokens
            .iter()
            .filter(|t| {
                if !t.is_priced() {
                    debug!(symbol = %t.symbol, price = t.current_price, "Dropping unpriced token");
                    return false;
                }
                match &reduced {
                    Some(list) => passes_reduced_list(&t.symbol, list),
                    None => true,
                }
            })
            .cloned()
            .collect();

        sort_by_market_cap(&mut kept);

        // Duplicate symbols: the larger-cap record wins since the list is sorted.
        let mut seen = HashSet::new();
        kept.retain(|t| seen.insert(t.symbol.clone()));

        kept.truncate(self.config.candidate_limit);

        info!(
            snapshot = tokens.len(),
            reduced_list = reduced.as_ref().map(|l| l.len()),
            curated = kept.len(),
            "Universe curated"
        );

        kept
    }
}

/// Whether `symbol` is listed and is not a longer variant of some other
/// listed symbol (`WETH2` is rejected when `ETH` is listed too).
pub fn passes_reduced_list(symbol: &str, reduced: &[&str]) -> bool {
    reduced.iter().any(|r| *r == symbol)
        && !reduced
            .iter()
            .any(|r| *r != symbol && symbol.contains(r))
}

/// Stable sort by descending market cap.
pub fn sort_by_market_cap(tokens: &mut [MarketToken]) {
    tokens.sort_by(|a, b| {
        b.market_cap
            .partial_cmp(&a.market_cap)
            .unwrap_or(Ordering::Equal)
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
