//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section falls back to the engine defaults, so a partial (or
//! empty) file is valid.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;

use crate::engine::planner::{PlannerConfig, SwapPlanner};
use crate::engine::wallet::WalletConfig;
use crate::strategy::distribution::{DistributionCalculator, DistributionConfig};
use crate::strategy::momentum::{MomentumConfig, MomentumEstimator, StablecoinRule};
use crate::strategy::AllocationEngine;
use crate::types::RiskProfile;
use crate::universe::{Curator, CuratorConfig};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub planner: PlannerSection,
    pub wallet: WalletSection,
    pub data: DataConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    pub candidate_limit: usize,
    pub min_history: usize,
    pub volatility_window: usize,
    pub stable_max_volatility_pct: f64,
    pub stable_peg_low: f64,
    pub stable_peg_high: f64,
    pub weight_tolerance: f64,
    pub default_profile: String,
    /// Symbol → USD market cap, replacing the snapshot value.
    pub cap_overrides: HashMap<String, f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            candidate_limit: 15,
            min_history: 1,
            volatility_window: 168,
            stable_max_volatility_pct: 2.0,
            stable_peg_low: 0.93,
            stable_peg_high: 1.07,
            weight_tolerance: 1e-3,
            default_profile: "Balanced".to_string(),
            cap_overrides: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PlannerSection {
    pub noise_floor_usd: Decimal,
    pub safety_margin_usd: Decimal,
    pub max_iterations: Option<usize>,
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            noise_floor_usd: dec!(1),
            safety_margin_usd: dec!(0.1),
            max_iterations: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WalletSection {
    pub gas_token: String,
    pub gas_reserve_usd: Decimal,
    /// `"100%"`, `"50%"` or a USD amount.
    pub invest: String,
}

impl Default for WalletSection {
    fn default() -> Self {
        Self {
            gas_token: "ETH".to_string(),
            gas_reserve_usd: dec!(2),
            invest: "100%".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DataConfig {
    pub snapshot_path: String,
    pub holdings_path: String,
    pub reduced_list_path: String,
    pub report_path: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            snapshot_path: "data/market_snapshot.json".to_string(),
            holdings_path: "data/holdings.json".to_string(),
            reduced_list_path: "data/reduced_list.json".to_string(),
            report_path: "rebalance_report.json".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn default_profile(&self) -> Result<RiskProfile> {
        self.engine
            .default_profile
            .parse::<RiskProfile>()
            .context("Invalid engine.default_profile")
    }

    /// Build the allocation engine described by the `[engine]` section.
    pub fn allocation_engine(&self) -> AllocationEngine {
        let e = &self.engine;
        AllocationEngine::new(
            Curator::new(CuratorConfig {
                candidate_limit: e.candidate_limit,
            }),
            MomentumEstimator::new(MomentumConfig {
                min_history: e.min_history,
                window: e.volatility_window,
            }),
            StablecoinRule {
                max_volatility_pct: e.stable_max_volatility_pct,
                peg_low: e.stable_peg_low,
                peg_high: e.stable_peg_high,
            },
            DistributionCalculator::new(DistributionConfig {
                weight_tolerance: e.weight_tolerance,
                ..DistributionConfig::default()
            }),
        )
    }

    pub fn swap_planner(&self) -> SwapPlanner {
        SwapPlanner::new(PlannerConfig {
            noise_floor: self.planner.noise_floor_usd,
            safety_margin: self.planner.safety_margin_usd,
            max_iterations: self.planner.max_iterations,
        })
    }

    pub fn wallet(&self) -> WalletConfig {
        WalletConfig {
            gas_token: self.wallet.gas_token.clone(),
            gas_reserve_usd: self.wallet.gas_reserve_usd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg = AppConfig::from_toml("").unwrap();
        assert_eq!(cfg.engine.candidate_limit, 15);
        assert_eq!(cfg.engine.volatility_window, 168);
        assert_eq!(cfg.planner.noise_floor_usd, dec!(1));
        assert_eq!(cfg.planner.safety_margin_usd, dec!(0.1));
        assert_eq!(cfg.wallet.gas_token, "ETH");
        assert_eq!(cfg.default_profile().unwrap(), RiskProfile::Balanced);
    }

    #[test]
    fn test_partial_config() {
        let cfg = AppConfig::from_toml(
            r#"
            [engine]
            default_profile = "Secure"
            candidate_limit = 8

            [engine.cap_overrides]
            WBTC = 1.2e12

            [planner]
            noise_floor_usd = 5
            max_iterations = 40

            [wallet]
            invest = "50%"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.default_profile().unwrap(), RiskProfile::Secure);
        assert_eq!(cfg.engine.candidate_limit, 8);
        assert_eq!(cfg.engine.min_history, 1);
        assert_eq!(cfg.engine.cap_overrides.get("WBTC"), Some(&1.2e12));
        assert_eq!(cfg.planner.noise_floor_usd, dec!(5));
        assert_eq!(cfg.planner.max_iterations, Some(40));
        assert_eq!(cfg.wallet.invest, "50%");
        assert_eq!(cfg.wallet.gas_reserve_usd, dec!(2));
    }

    #[test]
    fn test_invalid_profile() {
        let cfg = AppConfig::from_toml("[engine]\ndefault_profile = \"Reckless\"").unwrap();
        assert!(cfg.default_profile().is_err());
    }

    #[test]
    fn test_builders_follow_config() {
        let cfg = AppConfig::from_toml("[planner]\nsafety_margin_usd = 0.5").unwrap();
        assert_eq!(cfg.swap_planner().config().safety_margin, dec!(0.5));
        assert_eq!(cfg.wallet().gas_reserve_usd, dec!(2));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(AppConfig::load("/tmp/rebalancer_no_such_config.toml").is_err());
    }
}
