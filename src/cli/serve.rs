//! Serve command - run the ingestion service

use anyhow::Result;
use clap::Args;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::health::{self, HealthState};
use crate::provider::binance::{BinanceIngestClient, IngestStats};
use crate::publisher::{MemorySink, RedisStreamPublisher, TradeSink};
use crate::symbol::{PairDiscovery, PairUniverse};

/// Arguments for the serve command
#[derive(Args)]
pub struct ServeArgs {
    /// Subscribe to an explicit pair list instead of discovery (comma-separated)
    #[arg(long, short)]
    pub pairs: Option<String>,

    /// Publish to an in-memory sink instead of Redis
    #[arg(long)]
    pub dry_run: bool,

    /// Override the health bind address
    #[arg(long)]
    pub bind: Option<String>,
}

/// Execute the serve command
pub async fn execute(args: ServeArgs) -> Result<()> {
    let settings = Settings::load()?;

    info!("starting ingestion service");
    info!("  exchange ws: {}", settings.exchange.ws_url);
    info!("  redis: {}", settings.redis.url);
    info!("  max stream length: {}", settings.redis.max_stream_len);

    // Set up shutdown handling
    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);

    // Handle Ctrl+C
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl+c");
        info!("received shutdown signal");
        let _ = shutdown_tx_clone.send(());
    });

    // Connect the publisher. A failed connection does not abort startup;
    // the health surface reports the degraded state instead.
    let sink: Option<Arc<dyn TradeSink>> = if args.dry_run {
        info!("dry run: publishing to in-memory sink");
        Some(Arc::new(MemorySink::new(settings.redis.max_stream_len)))
    } else {
        match RedisStreamPublisher::connect(&settings.redis.url, settings.redis.max_stream_len)
            .await
        {
            Ok(publisher) => Some(Arc::new(publisher)),
            Err(e) => {
                error!("redis connection failed: {}", e);
                None
            }
        }
    };

    // Working set
    let universe = Arc::new(PairUniverse::new(settings.discovery.fallback_pairs.clone()));
    let discovery = Arc::new(PairDiscovery::new(
        &settings.discovery,
        Arc::clone(&universe),
    ));

    let pairs = if let Some(ref list) = args.pairs {
        let pairs: Vec<String> = list
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        universe.replace(pairs.clone());
        pairs
    } else {
        // Bounded initial refresh; fall back to the static list on timeout.
        let startup = settings.discovery.startup_timeout();
        if tokio::time::timeout(startup, discovery.refresh_pairs())
            .await
            .is_err()
        {
            warn!(
                "initial discovery did not finish within {:?}, using fallback pairs",
                startup
            );
        }

        let discovery_loop = Arc::clone(&discovery);
        let loop_shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            discovery_loop.run(loop_shutdown).await;
        });

        universe.pairs().as_ref().clone()
    };

    info!("working set: {} pairs", pairs.len());

    // Ingestion
    let mut connection_tasks = Vec::new();
    let ingest = match sink {
        Some(ref sink) => {
            let client = Arc::new(BinanceIngestClient::new(
                &settings.ingest,
                &settings.exchange.ws_url,
                Arc::clone(sink),
            ));
            connection_tasks = client.start(&pairs, &shutdown_tx);
            Some(client)
        }
        None => {
            warn!("no publisher available, ingestion disabled");
            None
        }
    };

    // Health surface
    let state = HealthState {
        publisher: sink.clone(),
        ingest: ingest
            .as_ref()
            .map(|c| c.stats_handle())
            .unwrap_or_else(|| Arc::new(IngestStats::default())),
        universe: Arc::clone(&universe),
    };

    let bind = args.bind.unwrap_or_else(|| settings.health.bind.clone());
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    let health_shutdown = shutdown_tx.subscribe();
    let health_task = tokio::spawn(async move {
        if let Err(e) = health::serve(listener, state, health_shutdown).await {
            error!("health surface error: {}", e);
        }
    });

    // Wait for shutdown, then drain the tasks.
    let _ = shutdown_rx.recv().await;
    info!("shutting down...");

    for task in connection_tasks {
        let _ = task.await;
    }
    let _ = health_task.await;

    if let Some(client) = ingest {
        let stats = client.stats();
        info!(
            "final stats: {} messages | {} malformed | {} connection errors",
            stats.total_messages, stats.error_messages, stats.connection_errors
        );
    }

    info!("ingestion service stopped");
    Ok(())
}
