//! Shared types for the rebalancing engine.
//!
//! These are the value objects passed between the curator, the
//! estimator, the distribution calculator and the swap planner. All of
//! them are built fresh for one rebalancing computation and dropped
//! afterwards; none of them carries hidden state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

/// One tradable asset as known to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketToken {
    pub symbol: String,
    /// Contract address. Carried for the caller, never read by the engine.
    #[serde(default)]
    pub address: Option<String>,
    /// USD market capitalization, TVL fallback already applied.
    pub market_cap: f64,
    /// USD spot price.
    pub current_price: f64,
    /// Hourly USD samples, oldest first.
    pub price_history: Vec<f64>,
}

impl fmt::Display for MarketToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ${:.4} (mcap: ${:.0} | {} samples)",
            self.symbol,
            self.current_price,
            self.market_cap,
            self.price_history.len(),
        )
    }
}

impl MarketToken {
    pub fn new(symbol: &str, market_cap: f64, current_price: f64, price_history: Vec<f64>) -> Self {
        Self {
            symbol: symbol.to_string(),
            address: None,
            market_cap,
            current_price,
            price_history,
        }
    }

    /// Whether the token can take part in weighting at all.
    pub fn is_priced(&self) -> bool {
        self.current_price.is_finite() && self.current_price > 0.0
    }
}

/// Pick the ranking capitalization for a token: the reported market cap,
/// or total value locked when the market cap is reported as zero.
pub fn resolve_market_cap(market_cap: f64, tvl: Option<f64>) -> f64 {
    if market_cap == 0.0 || !market_cap.is_finite() {
        tvl.filter(|v| v.is_finite()).unwrap_or(0.0)
    } else {
        market_cap
    }
}

/// Momentum and volatility derived for one curated token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSignal {
    pub symbol: String,
    /// Momentum-adjusted price estimate.
    pub ema: f64,
    /// Largest single-point deviation of the EMA window from its mean, in percent.
    pub max_std_dev_pct: f64,
}

impl fmt::Display for TokenSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ema=${:.4} vol={:.2}%",
            self.symbol, self.ema, self.max_std_dev_pct
        )
    }
}

// ---------------------------------------------------------------------------
// Risk profiles
// ---------------------------------------------------------------------------

/// Named allocation preset controlling concentration and breadth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskProfile {
    Secure,
    Balanced,
    Offensive,
}

/// Calibration parameters attached to a risk profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileParams {
    /// Scales the calibrated power-law exponent.
    pub alpha_k: f64,
    /// Target share of the smallest-cap token relative to the largest.
    pub min_share: f64,
    /// Number of tokens kept in the allocation.
    pub token_count: usize,
}

impl RiskProfile {
    pub const ALL: &'static [RiskProfile] = &[
        RiskProfile::Secure,
        RiskProfile::Balanced,
        RiskProfile::Offensive,
    ];

    pub fn params(&self) -> ProfileParams {
        match self {
            RiskProfile::Secure => ProfileParams {
                alpha_k: 0.80,
                min_share: 0.03,
                token_count: 5,
            },
            RiskProfile::Balanced => ProfileParams {
                alpha_k: 0.75,
                min_share: 0.03,
                token_count: 10,
            },
            RiskProfile::Offensive => ProfileParams {
                alpha_k: 0.50,
                min_share: 0.03,
                token_count: 10,
            },
        }
    }
}

impl Default for RiskProfile {
    fn default() -> Self {
        RiskProfile::Balanced
    }
}

impl fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskProfile::Secure => write!(f, "Secure"),
            RiskProfile::Balanced => write!(f, "Balanced"),
            RiskProfile::Offensive => write!(f, "Offensive"),
        }
    }
}

/// Parse a profile selector (case-insensitive).
impl std::str::FromStr for RiskProfile {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "secure" => Ok(RiskProfile::Secure),
            "balanced" => Ok(RiskProfile::Balanced),
            "offensive" => Ok(RiskProfile::Offensive),
            _ => Err(EngineError::UnknownProfile(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Allocation target
// ---------------------------------------------------------------------------

/// Target share of one token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub symbol: String,
    /// Share of the investable amount (0–1).
    pub weight_fraction: f64,
    /// `weight_fraction × total_amount`
    pub amount_usd: Decimal,
    /// Share in percent (0–100).
    pub percentage: f64,
}

impl fmt::Display for AllocationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.2}% (${:.2})",
            self.symbol, self.percentage, self.amount_usd
        )
    }
}

/// How the weights of a target were derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Calibration {
    /// Momentum-adjusted market caps raised to a calibrated exponent.
    PowerLaw { alpha: f64 },
    /// Calibration was undefined; every token got the same share.
    EqualWeight { reason: String },
}

impl fmt::Display for Calibration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Calibration::PowerLaw { alpha } => write!(f, "power-law (alpha={alpha:.4})"),
            Calibration::EqualWeight { reason } => write!(f, "equal-weight ({reason})"),
        }
    }
}

/// Target dollar allocation for one risk profile, in market-cap order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationTarget {
    pub profile: RiskProfile,
    pub total_amount: Decimal,
    pub entries: Vec<AllocationEntry>,
    pub calibration: Calibration,
}

impl AllocationTarget {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, symbol: &str) -> Option<&AllocationEntry> {
        self.entries.iter().find(|e| e.symbol == symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.symbol.as_str())
    }

    /// Sum of all weight fractions.
    pub fn weight_sum(&self) -> f64 {
        self.entries.iter().map(|e| e.weight_fraction).sum()
    }

    /// Whether the weights sum to 1 within `tolerance`.
    pub fn is_normalized(&self, tolerance: f64) -> bool {
        (self.weight_sum() - 1.0).abs() < tolerance
    }
}

impl fmt::Display for AllocationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.entries.iter().map(|e| e.to_string()).collect();
        write!(
            f,
            "[{}] ${:.2} over {} tokens via {}: {}",
            self.profile,
            self.total_amount,
            self.entries.len(),
            self.calibration,
            parts.join(", "),
        )
    }
}

// ---------------------------------------------------------------------------
// Holdings & swaps
// ---------------------------------------------------------------------------

/// A currently held, nonzero token balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub total_usd: Decimal,
}

impl Holding {
    pub fn new(symbol: &str, quantity: Decimal, price: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            quantity,
            price,
            total_usd: quantity * price,
        }
    }
}

impl fmt::Display for Holding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} @ ${} = ${:.2}",
            self.symbol, self.quantity, self.price, self.total_usd
        )
    }
}

/// Instruction to convert a USD amount of one token into another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOrder {
    pub sell: String,
    pub buy: String,
    pub amount_usd: Decimal,
}

impl SwapOrder {
    pub fn new(sell: &str, buy: &str, amount_usd: Decimal) -> Self {
        Self {
            sell: sell.to_string(),
            buy: buy.to_string(),
            amount_usd,
        }
    }
}

impl fmt::Display for SwapOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "swap ${:.2} {} -> {}", self.amount_usd, self.sell, self.buy)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by the engine itself. None of them is retried: the
/// engine is deterministic, so the same input fails the same way.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Insufficient price history for {symbol}: need {required} samples, got {available}")]
    InsufficientHistory {
        symbol: String,
        available: usize,
        required: usize,
    },

    #[error("Degenerate universe: {available} candidate token(s) left after filtering")]
    DegenerateUniverse { available: usize },

    #[error("Swap planning stalled after {iterations} iterations with {unresolved} unresolved deltas")]
    SwapPlanningStalled { iterations: usize, unresolved: usize },

    #[error("Unknown risk profile: {0}")]
    UnknownProfile(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
