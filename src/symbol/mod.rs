//! Pair working-set management and discovery

pub mod discovery;
pub mod universe;

pub use discovery::{compute_working_set, ExchangeSymbol, PairDiscovery};
pub use universe::PairUniverse;
