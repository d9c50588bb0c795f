//! Pairs command - one-shot discovery

use anyhow::Result;
use clap::Args;
use std::sync::Arc;

use crate::config::Settings;
use crate::symbol::{PairDiscovery, PairUniverse};

/// Arguments for the pairs command
#[derive(Args)]
pub struct PairsArgs {
    /// Maximum number of pairs to print
    #[arg(long, short)]
    pub limit: Option<usize>,
}

/// Execute the pairs command
pub async fn execute(args: PairsArgs) -> Result<()> {
    let settings = Settings::load()?;

    let universe = Arc::new(PairUniverse::new(settings.discovery.fallback_pairs.clone()));
    let discovery = PairDiscovery::new(&settings.discovery, Arc::clone(&universe));
    discovery.refresh_pairs().await;

    let pairs = universe.pairs();
    let limit = args.limit.unwrap_or(pairs.len());

    println!("{} pairs", pairs.len());
    for pair in pairs.iter().take(limit) {
        println!("{}", pair);
    }

    Ok(())
}
