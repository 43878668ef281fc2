//! Momentum and volatility estimation.
//!
//! Smooths a token's hourly price history into a latest-anchored EMA and
//! derives a volatility proxy from the spread of the EMA values. The
//! same proxy drives stablecoin detection.

use std::collections::VecDeque;

use tracing::debug;

use crate::types::{EngineError, MarketToken, TokenSignal};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MomentumConfig {
    /// Minimum number of price samples required.
    pub min_history: usize,
    /// Number of EMA values kept for the volatility measure (7 days hourly).
    pub window: usize,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            min_history: 1,
            window: 168,
        }
    }
}

/// Stablecoin detection thresholds. Both conditions must hold.
#[derive(Debug, Clone)]
pub struct StablecoinRule {
    /// Volatility (percent) below which a token may be pegged.
    pub max_volatility_pct: f64,
    /// Exclusive lower bound of the peg band.
    pub peg_low: f64,
    /// Exclusive upper bound of the peg band.
    pub peg_high: f64,
}

impl Default for StablecoinRule {
    fn default() -> Self {
        Self {
            max_volatility_pct: 2.0,
            peg_low: 0.93,
            peg_high: 1.07,
        }
    }
}

impl StablecoinRule {
    /// A token is a stablecoin when it is both calm and priced near $1.
    /// A calm token trading away from the peg is kept.
    pub fn is_stablecoin(&self, max_std_dev_pct: f64, current_price: f64) -> bool {
        max_std_dev_pct < self.max_volatility_pct
            && current_price > self.peg_low
            && current_price < self.peg_high
    }
}

// ---------------------------------------------------------------------------
// Estimator
// ---------------------------------------------------------------------------

/// Result of one momentum estimation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Momentum {
    pub ema: f64,
    pub max_std_dev_pct: f64,
}

pub struct MomentumEstimator {
    config: MomentumConfig,
}

impl MomentumEstimator {
    pub fn new(config: MomentumConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MomentumConfig {
        &self.config
    }

    /// Estimate momentum for a chronological (oldest first) price series.
    ///
    /// The EMA is seeded with the newest price and walks backwards with
    /// multiplier `k = 2 / (n + 1)`:
    ///   ema_i = price_i * k + ema_{i+1} * (1 - k)
    ///
    /// The volatility proxy is the largest single deviation of the last
    /// `window` EMA values from their mean, as a percent of that mean.
    pub fn estimate(&self, symbol: &str, prices: &[f64]) -> Result<Momentum, EngineError> {
        let n = prices.len();
        let required = self.config.min_history.max(1);
        if n < required {
            return Err(EngineError::InsufficientHistory {
                symbol: symbol.to_string(),
                available: n,
                required,
            });
        }

        let k = 2.0 / (n as f64 + 1.0);
        let window = self.config.window.max(1);

        let mut ema = prices[n - 1];
        let mut recent: VecDeque<f64> = VecDeque::with_capacity(window.min(n));
        recent.push_back(ema);

        for &price in prices[..n - 1].iter().rev() {
            ema = price * k + ema * (1.0 - k);
            recent.push_back(ema);
            if recent.len() > window {
                recent.pop_front();
            }
        }

        let mean = recent.iter().sum::<f64>() / recent.len() as f64;
        let max_sq_dev = recent
            .iter()
            .map(|v| (v - mean).powi(2))
            .fold(0.0_f64, f64::max);

        let max_std_dev_pct = if mean > 0.0 {
            max_sq_dev.sqrt() / mean * 100.0
        } else {
            f64::INFINITY
        };

        debug!(
            symbol,
            samples = n,
            ema = format!("{ema:.6}"),
            volatility = format!("{max_std_dev_pct:.3}%"),
            "Momentum estimated"
        );

        Ok(Momentum {
            ema,
            max_std_dev_pct,
        })
    }

    /// Estimate the signal for a curated token.
    pub fn signal(&self, token: &MarketToken) -> Result<TokenSignal, EngineError> {
        let m = self.estimate(&token.symbol, &token.price_history)?;
        Ok(TokenSignal {
            symbol: token.symbol.clone(),
            ema: m.ema,
            max_std_dev_pct: m.max_std_dev_pct,
        })
    }
}

/// Estimate with the default 168-sample window.
pub fn estimate_momentum(symbol: &str, prices: &[f64]) -> Result<Momentum, EngineError> {
    MomentumEstimator::new(MomentumConfig::default()).estimate(symbol, prices)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
