//! Data Ingestor CLI
//!
//! Provides commands for:
//! - `serve`: start the ingestion service
//! - `pairs`: print the discovered working set
//! - `tail`: read recent records from one pair's stream

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use data_ingestor::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("data_ingestor=info".parse()?))
        .init();

    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Execute command
    match cli.command {
        Commands::Serve(args) => {
            data_ingestor::cli::serve::execute(args).await?;
        }
        Commands::Pairs(args) => {
            data_ingestor::cli::pairs::execute(args).await?;
        }
        Commands::Tail(args) => {
            data_ingestor::cli::tail::execute(args).await?;
        }
    }

    Ok(())
}
