//! Tail command - read recent records from one pair's stream

use anyhow::Result;
use clap::Args;

use crate::config::Settings;
use crate::publisher::RedisStreamPublisher;

/// Arguments for the tail command
#[derive(Args)]
pub struct TailArgs {
    /// Pair to read
    pub pair: String,

    /// Number of records to print
    #[arg(long, short = 'n', default_value_t = 10)]
    pub count: usize,
}

/// Execute the tail command
pub async fn execute(args: TailArgs) -> Result<()> {
    let settings = Settings::load()?;

    let publisher =
        RedisStreamPublisher::connect(&settings.redis.url, settings.redis.max_stream_len).await?;

    let rows = publisher.recent(&args.pair, args.count).await?;
    if rows.is_empty() {
        println!("no records for {}", args.pair.to_uppercase());
        return Ok(());
    }

    for fields in rows {
        let line: Vec<String> = fields
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        println!("{}", line.join(" "));
    }

    Ok(())
}
