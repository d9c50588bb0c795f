//! Command-line interface

pub mod pairs;
pub mod serve;
pub mod tail;

use clap::{Parser, Subcommand};

/// Live trade ingestion service
#[derive(Parser)]
#[command(name = "data-ingestor", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the ingestion service
    Serve(serve::ServeArgs),
    /// Print the discovered working set and exit
    Pairs(pairs::PairsArgs),
    /// Print recent records from one pair's stream
    Tail(tail::TailArgs),
}
