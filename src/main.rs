//! REBALANCER: crypto portfolio rebalancing decision engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! reads the market snapshot and wallet holdings, computes the target
//! allocation for the selected risk profile and plans the swaps that
//! move the wallet onto it.
//!
//! Usage: `rebalancer [PROFILE] [AMOUNT]`, e.g. `rebalancer Secure 50%`.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{error, info, warn};

use rebalancer::config::AppConfig;
use rebalancer::engine::planner::compute_deltas;
use rebalancer::engine::wallet::{reserve_gas, scale_holdings, wallet_value, InvestmentAmount};
use rebalancer::storage::{self, RebalanceReport};
use rebalancer::types::RiskProfile;

const DEFAULT_CONFIG: &str = "config.toml";

fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var("REBALANCER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    let cfg = if Path::new(&config_path).exists() {
        AppConfig::load(&config_path)?
    } else {
        AppConfig::default()
    };

    init_logging();

    let mut args = std::env::args().skip(1);
    let profile = match args.next() {
        Some(p) => p.parse::<RiskProfile>()?,
        None => cfg.default_profile()?,
    };
    let invest: InvestmentAmount = args
        .next()
        .unwrap_or_else(|| cfg.wallet.invest.clone())
        .parse()
        .context("Invalid investment amount")?;

    info!(config = %config_path, profile = %profile, invest = ?invest, "REBALANCER starting up");

    // -- Inputs ------------------------------------------------------------

    let tokens = storage::load_snapshot(&cfg.data.snapshot_path, &cfg.engine.cap_overrides)?;
    let reduced = storage::load_reduced_list(&cfg.data.reduced_list_path)?;
    let holdings = reserve_gas(&storage::load_holdings(&cfg.data.holdings_path)?, &cfg.wallet());

    let value = wallet_value(&holdings);
    let amount = invest.resolve(value);
    let holdings = scale_holdings(&holdings, amount);
    info!(
        wallet = format!("${:.2}", value),
        investing = format!("${:.2}", amount),
        holdings = holdings.len(),
        "Wallet prepared"
    );

    // -- Allocation --------------------------------------------------------

    let outcome = match cfg
        .allocation_engine()
        .allocate(&tokens, reduced.as_deref(), profile, amount)
    {
        Ok(o) => o,
        Err(e) => {
            error!(error = %e, "Allocation aborted");
            return Err(e.into());
        }
    };

    for entry in &outcome.target.entries {
        info!(
            symbol = %entry.symbol,
            share = format!("{:.2}%", entry.percentage),
            amount = format!("${:.2}", entry.amount_usd),
            "Target"
        );
    }

    // -- Swaps -------------------------------------------------------------

    let deltas = compute_deltas(
        holdings.iter().map(|h| (h.symbol.as_str(), h.total_usd)),
        outcome
            .target
            .entries
            .iter()
            .map(|e| (e.symbol.as_str(), e.amount_usd)),
    );
    let plan = cfg.swap_planner().plan(deltas);

    for (i, swap) in plan.orders.iter().enumerate() {
        info!(step = i + 1, "{swap}");
    }
    if let Some(stall) = &plan.stall {
        warn!(error = %stall, "Swap plan incomplete");
    }

    let report = RebalanceReport::new(
        &outcome,
        plan.orders.clone(),
        plan.stall.as_ref().map(|e| e.to_string()),
    );
    storage::save_report(&report, &cfg.data.report_path)?;

    info!(
        run_id = %report.run_id,
        tokens = outcome.target.len(),
        swaps = plan.orders.len(),
        volume = format!("${:.2}", plan.volume()),
        report = %cfg.data.report_path,
        "Rebalance plan ready"
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rebalancer=info"));

    if std::env::var("REBALANCER_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
