//! Delta and swap planning.
//!
//! Compares current holdings to a target allocation and reduces the
//! per-token USD deltas to an ordered list of sell→buy swaps, pairing the
//! largest surplus with the largest shortfall on every step.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info, warn};

use crate::types::{AllocationTarget, EngineError, Holding, SwapOrder};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Deltas at or below this USD magnitude are treated as balanced.
    pub noise_floor: Decimal,
    /// Subtracted from every swap so price drift between planning and
    /// execution does not over-sell.
    pub safety_margin: Decimal,
    /// Hard iteration cap. `None` means twice the number of tokens.
    pub max_iterations: Option<usize>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            noise_floor: dec!(1),
            safety_margin: dec!(0.1),
            max_iterations: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Deltas
// ---------------------------------------------------------------------------

/// USD gap between target and current value of one token.
/// Positive = buy, negative = sell.
#[derive(Debug, Clone, PartialEq)]
pub struct Delta {
    pub symbol: String,
    pub amount: Decimal,
}

/// `target − current` over the union of both sides, in encounter order
/// (current symbols first). A symbol missing on one side counts as zero.
pub fn compute_deltas<'a, C, T>(current: C, target: T) -> Vec<Delta>
where
    C: IntoIterator<Item = (&'a str, Decimal)>,
    T: IntoIterator<Item = (&'a str, Decimal)>,
{
    let mut deltas: Vec<Delta> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();

    let mut add = |symbol: &'a str, amount: Decimal| {
        let idx = *index.entry(symbol).or_insert_with(|| {
            deltas.push(Delta {
                symbol: symbol.to_string(),
                amount: Decimal::ZERO,
            });
            deltas.len() - 1
        });
        deltas[idx].amount += amount;
    };

    for (symbol, value) in current {
        add(symbol, -value);
    }
    for (symbol, value) in target {
        add(symbol, value);
    }

    deltas
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Result of one planning pass.
#[derive(Debug, Clone)]
pub struct SwapPlan {
    pub orders: Vec<SwapOrder>,
    /// Deltas left after the emitted swaps.
    pub residual: Vec<Delta>,
    /// Set when planning stopped with deltas above the noise floor.
    pub stall: Option<EngineError>,
}

impl SwapPlan {
    pub fn is_stalled(&self) -> bool {
        self.stall.is_some()
    }

    /// Total USD moved by the plan.
    pub fn volume(&self) -> Decimal {
        self.orders.iter().map(|o| o.amount_usd).sum()
    }
}

pub struct SwapPlanner {
    config: PlannerConfig,
}

impl SwapPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Reduce `deltas` to swaps.
    ///
    /// While any delta exceeds the noise floor, sell the token with the
    /// most negative delta into the token with the most positive one for
    /// `min(|sell|, buy)`, minus the safety margin. Each step zeroes at
    /// least one side, so well-formed input finishes within one step per
    /// token; the iteration cap only guards malformed input.
    pub fn plan(&self, mut deltas: Vec<Delta>) -> SwapPlan {
        let floor = self.config.noise_floor;
        let cap = self
            .config
            .max_iterations
            .unwrap_or(2 * deltas.len())
            .max(1);

        let mut orders: Vec<SwapOrder> = Vec::new();
        let mut stall = None;
        let mut iterations = 0;

        while deltas.iter().any(|d| d.amount.abs() > floor) {
            if iterations >= cap {
                stall = Some(self.stalled(iterations, &deltas));
                break;
            }

            let (Some(sell), Some(buy)) = (largest_sell(&deltas), largest_buy(&deltas)) else {
                stall = Some(self.stalled(iterations, &deltas));
                break;
            };

            let swap = (-deltas[sell].amount).min(deltas[buy].amount);
            let amount = (swap - self.config.safety_margin).max(Decimal::ZERO);

            debug!(
                sell = %deltas[sell].symbol,
                buy = %deltas[buy].symbol,
                swap = %swap,
                amount = %amount,
                "Swap planned"
            );
            orders.push(SwapOrder::new(&deltas[sell].symbol, &deltas[buy].symbol, amount));

            deltas[sell].amount += swap;
            deltas[buy].amount -= swap;
            iterations += 1;
        }

        let plan = SwapPlan {
            orders,
            residual: deltas,
            stall,
        };

        info!(
            swaps = plan.orders.len(),
            volume = format!("${:.2}", plan.volume()),
            stalled = plan.is_stalled(),
            "Swap plan complete"
        );

        plan
    }

    fn stalled(&self, iterations: usize, deltas: &[Delta]) -> EngineError {
        let unresolved = deltas
            .iter()
            .filter(|d| d.amount.abs() > self.config.noise_floor)
            .count();
        let err = EngineError::SwapPlanningStalled {
            iterations,
            unresolved,
        };
        warn!(error = %err, "Swap list truncated");
        err
    }
}

/// Index of the most negative delta; ties go to the earliest.
fn largest_sell(deltas: &[Delta]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, d) in deltas.iter().enumerate() {
        if d.amount < Decimal::ZERO && best.map_or(true, |b| d.amount < deltas[b].amount) {
            best = Some(i);
        }
    }
    best
}

/// Index of the most positive delta; ties go to the earliest.
fn largest_buy(deltas: &[Delta]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, d) in deltas.iter().enumerate() {
        if d.amount > Decimal::ZERO && best.map_or(true, |b| d.amount > deltas[b].amount) {
            best = Some(i);
        }
    }
    best
}

/// Plan the swaps moving `holdings` to `target` with default settings.
pub fn plan_swaps(holdings: &[Holding], target: &AllocationTarget) -> Vec<SwapOrder> {
    let deltas = compute_deltas(
        holdings.iter().map(|h| (h.symbol.as_str(), h.total_usd)),
        target.entries.iter().map(|e| (e.symbol.as_str(), e.amount_usd)),
    );
    SwapPlanner::new(PlannerConfig::default()).plan(deltas).orders
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn deltas_of(current: &[(&'static str, Decimal)], target: &[(&'static str, Decimal)]) -> Vec<Delta> {
        compute_deltas(current.iter().copied(), target.iter().copied())
    }

    fn planner() -> SwapPlanner {
        SwapPlanner::new(PlannerConfig::default())
    }

    #[test]
    fn test_compute_deltas_union() {
        let d = deltas_of(
            &[("ETH", dec!(600)), ("USDC", dec!(400))],
            &[("ETH", dec!(300)), ("USDC", dec!(300)), ("BTC", dec!(400))],
        );
        assert_eq!(
            d,
            vec![
                Delta { symbol: "ETH".into(), amount: dec!(-300) },
                Delta { symbol: "USDC".into(), amount: dec!(-100) },
                Delta { symbol: "BTC".into(), amount: dec!(400) },
            ]
        );
    }

    #[test]
    fn test_basic_rebalance() {
        let d = deltas_of(
            &[("ETH", dec!(600)), ("USDC", dec!(400))],
            &[("ETH", dec!(300)), ("USDC", dec!(300)), ("BTC", dec!(400))],
        );
        let plan = planner().plan(d);
        assert_eq!(
            plan.orders,
            vec![
                SwapOrder::new("ETH", "BTC", dec!(299.9)),
                SwapOrder::new("USDC", "BTC", dec!(99.9)),
            ]
        );
        assert!(!plan.is_stalled());
        assert!(plan.residual.iter().all(|r| r.amount.is_zero()));
    }

    #[test]
    fn test_already_balanced() {
        let d = deltas_of(
            &[("ETH", dec!(500)), ("BTC", dec!(500))],
            &[("ETH", dec!(500)), ("BTC", dec!(500))],
        );
        let plan = planner().plan(d);
        assert!(plan.orders.is_empty());
        assert!(!plan.is_stalled());
    }

    #[test]
    fn test_within_noise_floor_is_balanced() {
        let d = deltas_of(&[("ETH", dec!(100.6))], &[("ETH", dec!(100)), ("BTC", dec!(0.6))]);
        assert!(planner().plan(d).orders.is_empty());
    }

    #[test]
    fn test_noise_floor_is_configurable() {
        let d = deltas_of(&[("ETH", dec!(100.6))], &[("ETH", dec!(100)), ("BTC", dec!(0.6))]);
        let tight = SwapPlanner::new(PlannerConfig {
            noise_floor: dec!(0.01),
            ..PlannerConfig::default()
        });
        let plan = tight.plan(d);
        assert_eq!(plan.orders, vec![SwapOrder::new("ETH", "BTC", dec!(0.5))]);
    }

    #[test]
    fn test_conservation_and_non_negativity() {
        let d = deltas_of(
            &[("A", dec!(1000)), ("B", dec!(250)), ("C", dec!(10)), ("D", dec!(740))],
            &[("A", dec!(400)), ("B", dec!(400)), ("E", dec!(700)), ("F", dec!(500))],
        );
        let n = d.len();
        let plan = planner().plan(d);
        assert!(!plan.is_stalled());
        assert!(plan.orders.len() <= n);
        assert!(plan.orders.iter().all(|o| o.amount_usd >= Decimal::ZERO));
        assert!(plan.residual.iter().all(|r| r.amount.abs() <= dec!(1)));
        // Every order is short of its underlying swap by at most the margin.
        let moved: Decimal = plan.volume() + dec!(0.1) * Decimal::from(plan.orders.len());
        assert_eq!(moved, dec!(1350));
    }

    #[test]
    fn test_tiny_swap_clamped_to_zero() {
        let d = vec![
            Delta { symbol: "A".into(), amount: dec!(-5) },
            Delta { symbol: "B".into(), amount: dec!(0.05) },
        ];
        let plan = planner().plan(d);
        assert_eq!(plan.orders, vec![SwapOrder::new("A", "B", dec!(0))]);
        assert!(plan.is_stalled());
    }

    #[test]
    fn test_one_sided_deltas_stall() {
        // Investing less than held: nothing left to buy.
        let d = deltas_of(&[("ETH", dec!(100))], &[]);
        let plan = planner().plan(d);
        assert!(plan.orders.is_empty());
        assert_eq!(
            plan.stall,
            Some(EngineError::SwapPlanningStalled { iterations: 0, unresolved: 1 })
        );
    }

    #[test]
    fn test_iteration_cap() {
        let d = deltas_of(
            &[("A", dec!(300)), ("B", dec!(200)), ("C", dec!(100))],
            &[("D", dec!(600))],
        );
        let capped = SwapPlanner::new(PlannerConfig {
            max_iterations: Some(1),
            ..PlannerConfig::default()
        });
        let plan = capped.plan(d);
        assert_eq!(plan.orders.len(), 1);
        assert!(matches!(
            plan.stall,
            Some(EngineError::SwapPlanningStalled { iterations: 1, unresolved: 3 })
        ));
    }

    #[test]
    fn test_ties_go_to_earliest() {
        let d = deltas_of(
            &[("A", dec!(100)), ("B", dec!(100))],
            &[("C", dec!(100)), ("D", dec!(100))],
        );
        let plan = planner().plan(d);
        assert_eq!(plan.orders[0], SwapOrder::new("A", "C", dec!(99.9)));
        assert_eq!(plan.orders[1], SwapOrder::new("B", "D", dec!(99.9)));
    }

    #[test]
    fn test_plan_swaps_from_holdings() {
        use crate::types::{AllocationEntry, Calibration, RiskProfile};

        let holdings = vec![
            Holding::new("ETH", dec!(0.2), dec!(3000)),
            Holding::new("USDC", dec!(400), dec!(1)),
        ];
        let target = AllocationTarget {
            profile: RiskProfile::Balanced,
            total_amount: dec!(1000),
            entries: vec![
                AllocationEntry { symbol: "ETH".into(), weight_fraction: 0.3, amount_usd: dec!(300), percentage: 30.0 },
                AllocationEntry { symbol: "USDC".into(), weight_fraction: 0.3, amount_usd: dec!(300), percentage: 30.0 },
                AllocationEntry { symbol: "BTC".into(), weight_fraction: 0.4, amount_usd: dec!(400), percentage: 40.0 },
            ],
            calibration: Calibration::PowerLaw { alpha: 1.0 },
        };
        let swaps = plan_swaps(&holdings, &target);
        assert_eq!(swaps.len(), 2);
        assert_eq!(swaps[0], SwapOrder::new("ETH", "BTC", dec!(299.9)));
        assert_eq!(swaps[1], SwapOrder::new("USDC", "BTC", dec!(99.9)));
    }
}
