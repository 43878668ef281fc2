//! Wallet holdings preparation.
//!
//! Builds `Holding`s from raw balances, withholds the gas reserve, and
//! resolves how much of the wallet is put to work.

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, warn};

use crate::types::{EngineError, Holding};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WalletConfig {
    /// Token paying for transaction fees.
    pub gas_token: String,
    /// USD value of the gas token kept out of the rebalance.
    pub gas_reserve_usd: Decimal,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            gas_token: "ETH".to_string(),
            gas_reserve_usd: dec!(2),
        }
    }
}

// ---------------------------------------------------------------------------
// Holdings
// ---------------------------------------------------------------------------

/// One holding per nonzero balance with a known price.
pub fn build_holdings(
    balances: &[(String, Decimal)],
    prices: &HashMap<String, Decimal>,
) -> Vec<Holding> {
    balances
        .iter()
        .filter(|(_, quantity)| !quantity.is_zero())
        .filter_map(|(symbol, quantity)| match prices.get(symbol) {
            Some(price) => Some(Holding::new(symbol, *quantity, *price)),
            None => {
                warn!(symbol = %symbol, quantity = %quantity, "No price for held token, skipped");
                None
            }
        })
        .collect()
}

/// Total USD value of `holdings`.
pub fn wallet_value(holdings: &[Holding]) -> Decimal {
    holdings.iter().map(|h| h.total_usd).sum()
}

/// Withhold `config.gas_reserve_usd` of the gas token. The reserve is
/// clamped to what is held; holdings emptied by it are dropped.
pub fn reserve_gas(holdings: &[Holding], config: &WalletConfig) -> Vec<Holding> {
    holdings
        .iter()
        .map(|h| {
            if h.symbol != config.gas_token {
                return h.clone();
            }
            let reserve = config.gas_reserve_usd.min(h.total_usd).max(Decimal::ZERO);
            let mut kept = h.clone();
            kept.total_usd -= reserve;
            if !h.price.is_zero() {
                kept.quantity -= reserve / h.price;
            }
            debug!(symbol = %h.symbol, reserve = %reserve, "Gas reserve withheld");
            kept
        })
        .filter(|h| h.total_usd > Decimal::ZERO)
        .collect()
}

/// Scale every holding so the portfolio is worth `amount` in total.
pub fn scale_holdings(holdings: &[Holding], amount: Decimal) -> Vec<Holding> {
    let value = wallet_value(holdings);
    if value.is_zero() {
        return holdings.to_vec();
    }
    let factor = amount / value;
    holdings
        .iter()
        .map(|h| Holding {
            symbol: h.symbol.clone(),
            quantity: h.quantity * factor,
            price: h.price,
            total_usd: h.total_usd * factor,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Investable amount
// ---------------------------------------------------------------------------

/// How much of the wallet to rebalance: `"50%"` or `"250"` (USD).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvestmentAmount {
    Percent(Decimal),
    Absolute(Decimal),
}

impl InvestmentAmount {
    /// USD amount for a wallet worth `wallet_value`, never more than the wallet.
    pub fn resolve(&self, wallet_value: Decimal) -> Decimal {
        let amount = match self {
            InvestmentAmount::Percent(pct) => wallet_value * pct / dec!(100),
            InvestmentAmount::Absolute(usd) => *usd,
        };
        amount.min(wallet_value).max(Decimal::ZERO)
    }
}

impl FromStr for InvestmentAmount {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (number, is_percent) = match s.strip_suffix('%') {
            Some(n) => (n.trim(), true),
            None => (s.trim_start_matches('$'), false),
        };
        let value = Decimal::from_str(number)
            .map_err(|e| EngineError::InvalidAmount(format!("{s}: {e}")))?;
        if value.is_sign_negative() {
            return Err(EngineError::InvalidAmount(format!("{s}: must not be negative")));
        }
        Ok(if is_percent {
            InvestmentAmount::Percent(value)
        } else {
            InvestmentAmount::Absolute(value)
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
