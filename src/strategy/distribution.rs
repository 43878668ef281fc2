//! Weight distribution.
//!
//! Turns market cap, momentum and price into a normalized target
//! allocation for a risk profile. Weights follow a power law of the
//! momentum-adjusted market cap:
//!
//!   score = (market_cap * ema / price) ^ alpha
//!
//! with `alpha` calibrated so that, in an idealized two-token case, the
//! smallest-cap token gets roughly `min_share` of the largest one's weight.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::types::{
    AllocationEntry, AllocationTarget, Calibration, EngineError, MarketToken, ProfileParams,
    RiskProfile, TokenSignal,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DistributionConfig {
    /// Allowed deviation of the weight sum from 1 before a warning is logged.
    pub weight_tolerance: f64,
    /// Decimal places kept on USD amounts.
    pub amount_dp: u32,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            weight_tolerance: 1e-3,
            amount_dp: 6,
        }
    }
}

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

/// A curated, non-stable token with its momentum signal attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub symbol: String,
    pub market_cap: f64,
    pub current_price: f64,
    pub ema: f64,
}

impl Candidate {
    pub fn new(token: &MarketToken, signal: &TokenSignal) -> Self {
        Self {
            symbol: token.symbol.clone(),
            market_cap: token.market_cap,
            current_price: token.current_price,
            ema: signal.ema,
        }
    }

    /// Momentum-adjusted market cap: `ema / price` scales the cap.
    pub fn adjusted_cap(&self) -> f64 {
        self.market_cap * self.ema / self.current_price
    }
}

/// Calibrate the power-law exponent from the largest and smallest caps.
///
///   alpha = alpha_k * ln(min_share) / ln(smallest / largest)
///
/// Returns `None` when the ratio makes the exponent undefined (equal
/// caps, zero or negative caps).
pub fn calibrate_alpha(params: &ProfileParams, largest_cap: f64, smallest_cap: f64) -> Option<f64> {
    if largest_cap <= 0.0 || smallest_cap <= 0.0 {
        return None;
    }
    let denominator = (smallest_cap / largest_cap).ln();
    if denominator == 0.0 || !denominator.is_finite() {
        return None;
    }
    let alpha = params.alpha_k * params.min_share.ln() / denominator;
    alpha.is_finite().then_some(alpha)
}

// ---------------------------------------------------------------------------
// Calculator
// ---------------------------------------------------------------------------

pub struct DistributionCalculator {
    config: DistributionConfig,
}

impl DistributionCalculator {
    pub fn new(config: DistributionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DistributionConfig {
        &self.config
    }

    /// Compute the target allocation for `profile`.
    ///
    /// `candidates` must be sorted by descending market cap; only the
    /// first `token_count` of them are used. When calibration is
    /// undefined (a single candidate, equal caps, degenerate scores) the
    /// amount is split evenly instead.
    pub fn distribute(
        &self,
        candidates: &[Candidate],
        profile: RiskProfile,
        total_amount: Decimal,
    ) -> Result<AllocationTarget, EngineError> {
        if total_amount.is_sign_negative() {
            return Err(EngineError::InvalidAmount(format!(
                "total amount must not be negative, got {total_amount}"
            )));
        }

        let params = profile.params();
        let selected = &candidates[..candidates.len().min(params.token_count)];

        if selected.is_empty() {
            return Err(EngineError::DegenerateUniverse { available: 0 });
        }

        let (weights, calibration) = match self.power_law_weights(selected, &params) {
            Ok((weights, alpha)) => (weights, Calibration::PowerLaw { alpha }),
            Err(reason) => {
                warn!(
                    profile = %profile,
                    tokens = selected.len(),
                    reason = %reason,
                    "Calibration undefined, falling back to equal weights"
                );
                let w = 1.0 / selected.len() as f64;
                (vec![w; selected.len()], Calibration::EqualWeight { reason })
            }
        };

        let entries: Vec<AllocationEntry> = selected
            .iter()
            .zip(&weights)
            .map(|(c, &w)| AllocationEntry {
                symbol: c.symbol.clone(),
                weight_fraction: w,
                amount_usd: (Decimal::from_f64(w).unwrap_or(Decimal::ZERO) * total_amount)
                    .round_dp(self.config.amount_dp),
                percentage: w * 100.0,
            })
            .collect();

        let target = AllocationTarget {
            profile,
            total_amount,
            entries,
            calibration,
        };

        let sum = target.weight_sum();
        if !target.is_normalized(self.config.weight_tolerance) {
            warn!(
                sum,
                tolerance = self.config.weight_tolerance,
                "Weight sum outside tolerance"
            );
        }

        info!(
            profile = %profile,
            tokens = target.len(),
            calibration = %target.calibration,
            total = format!("${:.2}", total_amount),
            "Distribution computed"
        );

        Ok(target)
    }

    /// Normalized power-law weights, or the reason they are undefined.
    fn power_law_weights(
        &self,
        selected: &[Candidate],
        params: &ProfileParams,
    ) -> Result<(Vec<f64>, f64), String> {
        if selected.len() < 2 {
            return Err(format!("{} candidate(s), need 2 to calibrate", selected.len()));
        }

        let largest = selected[0].market_cap;
        let smallest = selected[selected.len() - 1].market_cap;
        let alpha = calibrate_alpha(params, largest, smallest).ok_or_else(|| {
            format!("cap ratio {smallest:.2}/{largest:.2} gives no usable exponent")
        })?;

        let scores: Vec<f64> = selected
            .iter()
            .map(|c| c.adjusted_cap().powf(alpha))
            .collect();

        let total: f64 = scores.iter().sum();
        if !total.is_finite() || total <= 0.0 || scores.iter().any(|s| !s.is_finite()) {
            return Err(format!("score sum {total} is not usable"));
        }

        for (c, s) in selected.iter().zip(&scores) {
            debug!(
                symbol = %c.symbol,
                adjusted_cap = format!("{:.0}", c.adjusted_cap()),
                weight = format!("{:.2}%", s / total * 100.0),
                "Token weighted"
            );
        }

        Ok((scores.iter().map(|s| s / total).collect(), alpha))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn make_candidate(symbol: &str, market_cap: f64, price: f64, ema: f64) -> Candidate {
        Candidate {
            symbol: symbol.to_string(),
            market_cap,
            current_price: price,
            ema,
        }
    }

    fn make_universe(n: usize) -> Vec<Candidate> {
        (0..n)
            .map(|i| make_candidate(&format!("T{i}"), 1e9 / (i as f64 + 1.0).powi(2), 2.0, 2.0))
            .collect()
    }

    fn calculator() -> DistributionCalculator {
        DistributionCalculator::new(DistributionConfig::default())
    }

    #[test]
    fn test_calibrate_alpha_hits_min_share() {
        let params = ProfileParams {
            alpha_k: 1.0,
            min_share: 0.03,
            token_count: 2,
        };
        let alpha = calibrate_alpha(&params, 1_000.0, 50.0).unwrap();
        let ratio = 50.0_f64.powf(alpha) / 1_000.0_f64.powf(alpha);
        assert!((ratio - 0.03).abs() < 1e-9);
    }

    #[test]
    fn test_calibrate_alpha_undefined_cases() {
        let params = RiskProfile::Balanced.params();
        assert!(calibrate_alpha(&params, 100.0, 100.0).is_none());
        assert!(calibrate_alpha(&params, 100.0, 0.0).is_none());
        assert!(calibrate_alpha(&params, 0.0, 0.0).is_none());
    }

    #[test]
    fn test_weights_sum_to_one() {
        for profile in RiskProfile::ALL {
            let t = calculator()
                .distribute(&make_universe(12), *profile, dec!(1000))
                .unwrap();
            assert!((t.weight_sum() - 1.0).abs() < 1e-3, "{profile}: {}", t.weight_sum());
            assert!(matches!(t.calibration, Calibration::PowerLaw { .. }));
        }
    }

    #[test]
    fn test_profile_token_counts() {
        let universe = make_universe(12);
        let secure = calculator().distribute(&universe, RiskProfile::Secure, dec!(1000)).unwrap();
        let balanced = calculator().distribute(&universe, RiskProfile::Balanced, dec!(1000)).unwrap();
        let offensive = calculator().distribute(&universe, RiskProfile::Offensive, dec!(1000)).unwrap();
        assert_eq!(secure.len(), 5);
        assert_eq!(balanced.len(), 10);
        assert_eq!(offensive.len(), 10);
    }

    #[test]
    fn test_fewer_candidates_than_profile_count() {
        let t = calculator()
            .distribute(&make_universe(3), RiskProfile::Balanced, dec!(1000))
            .unwrap();
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_order_preserved_and_largest_weighted_most() {
        let t = calculator()
            .distribute(&make_universe(5), RiskProfile::Secure, dec!(1000))
            .unwrap();
        assert_eq!(t.symbols().collect::<Vec<_>>(), vec!["T0", "T1", "T2", "T3", "T4"]);
        for pair in t.entries.windows(2) {
            assert!(pair[0].weight_fraction > pair[1].weight_fraction);
        }
    }

    #[test]
    fn test_offensive_is_flatter_than_secure() {
        let universe = make_universe(5);
        let secure = calculator().distribute(&universe, RiskProfile::Secure, dec!(1000)).unwrap();
        let offensive = calculator().distribute(&universe, RiskProfile::Offensive, dec!(1000)).unwrap();
        // Lower alpha_k → smaller exponent → more weight on the tail.
        assert!(offensive.entries[4].weight_fraction > secure.entries[4].weight_fraction);
    }

    #[test]
    fn test_amount_and_percentage_consistent() {
        let t = calculator()
            .distribute(&make_universe(4), RiskProfile::Balanced, dec!(2500))
            .unwrap();
        for e in &t.entries {
            let expected = Decimal::from_f64(e.weight_fraction * 2500.0).unwrap();
            assert!((e.amount_usd - expected).abs() < dec!(0.0001));
            assert!((e.percentage - e.weight_fraction * 100.0).abs() < 1e-12);
        }
        let total: Decimal = t.entries.iter().map(|e| e.amount_usd).sum();
        assert!((total - dec!(2500)).abs() < dec!(0.01));
    }

    #[test]
    fn test_positive_momentum_raises_weight() {
        let flat = vec![
            make_candidate("BIG", 1_000.0, 1.0, 1.0),
            make_candidate("SMALL", 100.0, 1.0, 1.0),
        ];
        let rising = vec![
            make_candidate("BIG", 1_000.0, 1.0, 1.0),
            make_candidate("SMALL", 100.0, 1.0, 1.5),
        ];
        let a = calculator().distribute(&flat, RiskProfile::Balanced, dec!(100)).unwrap();
        let b = calculator().distribute(&rising, RiskProfile::Balanced, dec!(100)).unwrap();
        assert!(b.entries[1].weight_fraction > a.entries[1].weight_fraction);
    }

    #[test]
    fn test_single_candidate_gets_everything() {
        let t = calculator()
            .distribute(&make_universe(1), RiskProfile::Secure, dec!(500))
            .unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.entries[0].weight_fraction, 1.0);
        assert_eq!(t.entries[0].amount_usd, dec!(500));
        assert!(matches!(t.calibration, Calibration::EqualWeight { .. }));
    }

    #[test]
    fn test_equal_caps_fall_back_to_equal_weight() {
        let universe = vec![
            make_candidate("A", 500.0, 1.0, 1.0),
            make_candidate("B", 500.0, 1.0, 1.0),
        ];
        let t = calculator().distribute(&universe, RiskProfile::Balanced, dec!(100)).unwrap();
        assert_eq!(t.entries[0].weight_fraction, 0.5);
        assert_eq!(t.entries[1].amount_usd, dec!(50));
        assert!(matches!(t.calibration, Calibration::EqualWeight { .. }));
    }

    #[test]
    fn test_empty_universe_is_degenerate() {
        let err = calculator()
            .distribute(&[], RiskProfile::Balanced, dec!(100))
            .unwrap_err();
        assert_eq!(err, EngineError::DegenerateUniverse { available: 0 });
    }

    #[test]
    fn test_negative_amount_rejected() {
        let err = calculator()
            .distribute(&make_universe(3), RiskProfile::Balanced, dec!(-1))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
    }
}
