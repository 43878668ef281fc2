//! Persistence layer.
//!
//! Loads the market snapshot, wallet holdings and reduced symbol list
//! from JSON files, and writes the rebalance report back out. Loosely
//! typed market records are resolved into `MarketToken`s here, once, so
//! nothing downstream has to care about missing caps or odd symbols.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::strategy::AllocationOutcome;
use crate::types::{resolve_market_cap, AllocationTarget, Holding, MarketToken, RiskProfile, SwapOrder};
use crate::universe::reduce::sanitize_symbol;

// ---------------------------------------------------------------------------
// Snapshot records
// ---------------------------------------------------------------------------

/// Market record as delivered by the token-list API.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMarketRecord {
    pub symbol: String,
    #[serde(default)]
    pub address: Option<String>,
    pub market: RawMarketData,
    #[serde(default)]
    pub line_price_feed_in_usd: Vec<RawPricePoint>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMarketData {
    pub current_price: f64,
    #[serde(default)]
    pub market_cap: f64,
    /// Total value locked, used when `market_cap` is zero.
    #[serde(default, alias = "starknetTvl")]
    pub tvl: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawPricePoint {
    #[serde(default)]
    pub date: Option<String>,
    pub value: f64,
}

impl RawMarketRecord {
    /// Resolve into a `MarketToken`: sanitized symbol, TVL fallback, then
    /// any configured cap override for the symbol.
    pub fn into_token(self, cap_overrides: &HashMap<String, f64>) -> MarketToken {
        let symbol = sanitize_symbol(&self.symbol);
        let market_cap = match cap_overrides.get(&symbol) {
            Some(cap) => {
                debug!(symbol = %symbol, cap, "Market cap overridden");
                *cap
            }
            None => resolve_market_cap(self.market.market_cap, self.market.tvl),
        };
        MarketToken {
            symbol,
            address: self.address,
            market_cap,
            current_price: self.market.current_price,
            price_history: self.line_price_feed_in_usd.iter().map(|p| p.value).collect(),
        }
    }
}

/// Parse a snapshot document into tokens.
pub fn parse_snapshot(json: &str, cap_overrides: &HashMap<String, f64>) -> Result<Vec<MarketToken>> {
    let records: Vec<RawMarketRecord> =
        serde_json::from_str(json).context("Failed to parse market snapshot")?;
    Ok(records
        .into_iter()
        .map(|r| r.into_token(cap_overrides))
        .collect())
}

/// Load the market snapshot from a JSON file.
pub fn load_snapshot(path: &str, cap_overrides: &HashMap<String, f64>) -> Result<Vec<MarketToken>> {
    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read market snapshot from {path}"))?;
    let tokens = parse_snapshot(&json, cap_overrides)
        .context(format!("Invalid market snapshot in {path}"))?;
    info!(path, tokens = tokens.len(), "Market snapshot loaded");
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Holdings & reduced list
// ---------------------------------------------------------------------------

/// Wallet balance as reported by the balance collaborator.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawHolding {
    pub symbol: String,
    pub quantity: Decimal,
    pub price: Decimal,
}

/// Load holdings from a JSON file. Zero balances are dropped.
pub fn load_holdings(path: &str) -> Result<Vec<Holding>> {
    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read holdings from {path}"))?;
    let raw: Vec<RawHolding> = serde_json::from_str(&json)
        .context(format!("Failed to parse holdings from {path}"))?;
    let holdings: Vec<Holding> = raw
        .into_iter()
        .filter(|h| !h.quantity.is_zero())
        .map(|h| Holding::new(&sanitize_symbol(&h.symbol), h.quantity, h.price))
        .collect();
    info!(path, holdings = holdings.len(), "Holdings loaded");
    Ok(holdings)
}

/// Load the reduced symbol list. Returns None if the file doesn't exist,
/// in which case curation passes the whole universe through.
pub fn load_reduced_list(path: &str) -> Result<Option<Vec<String>>> {
    if !Path::new(path).exists() {
        info!(path, "No reduced list found, using full universe");
        return Ok(None);
    }
    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read reduced list from {path}"))?;
    let list: Vec<String> = serde_json::from_str(&json)
        .context(format!("Failed to parse reduced list from {path}"))?;
    info!(path, symbols = list.len(), "Reduced list loaded");
    Ok(Some(list))
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Everything one rebalancing run decided, for the caller to display or
/// hand to an executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceReport {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub profile: RiskProfile,
    pub total_amount: Decimal,
    pub allocation: AllocationTarget,
    pub excluded_stablecoins: Vec<String>,
    pub swaps: Vec<SwapOrder>,
    /// Present when the swap list was truncated.
    pub stalled: Option<String>,
}

impl RebalanceReport {
    pub fn new(outcome: &AllocationOutcome, swaps: Vec<SwapOrder>, stalled: Option<String>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            profile: outcome.target.profile,
            total_amount: outcome.target.total_amount,
            allocation: outcome.target.clone(),
            excluded_stablecoins: outcome.excluded_stablecoins().map(String::from).collect(),
            swaps,
            stalled,
        }
    }
}

/// Save a report to a JSON file.
pub fn save_report(report: &RebalanceReport, path: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .context("Failed to serialise rebalance report")?;
    std::fs::write(path, &json)
        .context(format!("Failed to write report to {path}"))?;
    debug!(path, run_id = %report.run_id, "Report saved");
    Ok(())
}

/// Load a previously saved report.
pub fn load_report(path: &str) -> Result<RebalanceReport> {
    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read report from {path}"))?;
    serde_json::from_str(&json).context(format!("Failed to parse report from {path}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
