//! Rebalance engine: holdings preparation and swap planning.

pub mod planner;
pub mod wallet;
