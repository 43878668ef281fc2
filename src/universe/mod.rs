//! Token universe: curation of the raw market snapshot and the
//! reduced-list helpers that feed it.

pub mod curator;
pub mod reduce;

pub use curator::{CuratedUniverse, Curator, CuratorConfig};
