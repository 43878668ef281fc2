//! Allocation engine: curation, momentum scoring, stablecoin exclusion
//! and weight distribution.

pub mod distribution;
pub mod momentum;

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::types::{AllocationTarget, EngineError, MarketToken, RiskProfile, TokenSignal};
use crate::universe::{Curator, CuratorConfig};
use distribution::{Candidate, DistributionCalculator, DistributionConfig};
use momentum::{MomentumConfig, MomentumEstimator, StablecoinRule};

// ---------------------------------------------------------------------------
// Decision log
// ---------------------------------------------------------------------------

/// What happened to each curated token during one allocation.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenDecision {
    /// Token received a share of the target.
    Allocated {
        signal: TokenSignal,
        weight_fraction: f64,
    },
    /// Calm and priced near $1: treated as a stablecoin.
    ExcludedStablecoin { signal: TokenSignal, price: f64 },
    /// Valid candidate, cut by the profile's token count.
    BeyondProfile { signal: TokenSignal },
}

impl TokenDecision {
    pub fn symbol(&self) -> &str {
        match self {
            TokenDecision::Allocated { signal, .. }
            | TokenDecision::ExcludedStablecoin { signal, .. }
            | TokenDecision::BeyondProfile { signal } => &signal.symbol,
        }
    }
}

/// Target allocation together with the per-token decision log.
#[derive(Debug, Clone)]
pub struct AllocationOutcome {
    pub target: AllocationTarget,
    pub decisions: Vec<TokenDecision>,
}

impl AllocationOutcome {
    pub fn excluded_stablecoins(&self) -> impl Iterator<Item = &str> {
        self.decisions.iter().filter_map(|d| match d {
            TokenDecision::ExcludedStablecoin { signal, .. } => Some(signal.symbol.as_str()),
            _ => None,
        })
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Pipelines curation → momentum → stablecoin exclusion → distribution.
///
/// Stateless: every call works on its own snapshot and returns a fresh
/// result, so one engine can serve any number of invocations.
pub struct AllocationEngine {
    curator: Curator,
    estimator: MomentumEstimator,
    stablecoin: StablecoinRule,
    calculator: DistributionCalculator,
}

impl Default for AllocationEngine {
    fn default() -> Self {
        Self::new(
            Curator::new(CuratorConfig::default()),
            MomentumEstimator::new(MomentumConfig::default()),
            StablecoinRule::default(),
            DistributionCalculator::new(DistributionConfig::default()),
        )
    }
}

impl AllocationEngine {
    pub fn new(
        curator: Curator,
        estimator: MomentumEstimator,
        stablecoin: StablecoinRule,
        calculator: DistributionCalculator,
    ) -> Self {
        Self {
            curator,
            estimator,
            stablecoin,
            calculator,
        }
    }

    /// Run the full allocation pipeline.
    ///
    /// Steps:
    /// 1. Curate the snapshot (reduced-list filter, cap ranking, top 15).
    /// 2. Estimate momentum for every candidate. A single failure aborts
    ///    the whole allocation; no partial target is returned.
    /// 3. Exclude stablecoins.
    /// 4. Distribute weights over the profile's top `token_count`.
    pub fn allocate(
        &self,
        universe: &[MarketToken],
        reduced: Option<&[String]>,
        profile: RiskProfile,
        total_amount: Decimal,
    ) -> Result<AllocationOutcome, EngineError> {
        // Step 1 – curation
        let curated = self.curator.curate(universe, reduced);

        // Step 2 – signals (all or nothing)
        let signals = curated
            .iter()
            .map(|t| self.estimator.signal(t))
            .collect::<Result<Vec<_>, _>>()?;

        // Step 3 – stablecoin exclusion
        let mut decisions: Vec<TokenDecision> = Vec::new();
        let mut candidates: Vec<(Candidate, TokenSignal)> = Vec::new();
        for (token, signal) in curated.iter().zip(signals) {
            if self
                .stablecoin
                .is_stablecoin(signal.max_std_dev_pct, token.current_price)
            {
                debug!(
                    symbol = %token.symbol,
                    price = token.current_price,
                    volatility = format!("{:.3}%", signal.max_std_dev_pct),
                    "Excluded as stablecoin"
                );
                decisions.push(TokenDecision::ExcludedStablecoin {
                    signal,
                    price: token.current_price,
                });
            } else {
                candidates.push((Candidate::new(token, &signal), signal));
            }
        }

        // Step 4 – distribution
        let scored: Vec<Candidate> = candidates.iter().map(|(c, _)| c.clone()).collect();
        let target = self.calculator.distribute(&scored, profile, total_amount)?;

        for (candidate, signal) in candidates {
            match target.get(&candidate.symbol) {
                Some(entry) => decisions.push(TokenDecision::Allocated {
                    signal,
                    weight_fraction: entry.weight_fraction,
                }),
                None => decisions.push(TokenDecision::BeyondProfile { signal }),
            }
        }

        info!(
            profile = %profile,
            curated = curated.len(),
            stablecoins = decisions
                .iter()
                .filter(|d| matches!(d, TokenDecision::ExcludedStablecoin { .. }))
                .count(),
            allocated = target.len(),
            "Allocation complete"
        );

        Ok(AllocationOutcome { target, decisions })
    }
}

/// Compute a target allocation with the default engine settings.
pub fn compute_allocation(
    universe: &[MarketToken],
    reduced: Option<&[String]>,
    profile: RiskProfile,
    total_amount: Decimal,
) -> Result<AllocationTarget, EngineError> {
    AllocationEngine::default()
        .allocate(universe, reduced, profile, total_amount)
        .map(|outcome| outcome.target)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
