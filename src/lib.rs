//! REBALANCER: crypto portfolio rebalancing decision engine
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod universe;
pub mod strategy;
pub mod engine;
pub mod storage;

pub use engine::planner::plan_swaps;
pub use strategy::compute_allocation;
