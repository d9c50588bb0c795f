//! Health surface behavior over a real listener

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use data_ingestor::health::{serve, HealthState};
use data_ingestor::provider::binance::IngestStats;
use data_ingestor::publisher::{MemorySink, PublisherStats, PublisherStatsSnapshot, TradeSink};
use data_ingestor::schema::NormalizedTrade;
use data_ingestor::symbol::PairUniverse;

/// Sink whose broker connection always reports down.
struct DeadBrokerSink {
    stats: PublisherStats,
}

#[async_trait]
impl TradeSink for DeadBrokerSink {
    async fn publish(&self, _pair: &str, _trade: &NormalizedTrade) -> bool {
        self.stats.record_error();
        false
    }

    async fn is_healthy(&self) -> bool {
        false
    }

    fn stats(&self) -> PublisherStatsSnapshot {
        self.stats.snapshot()
    }
}

async fn spawn_surface(state: HealthState) -> (SocketAddr, broadcast::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, _) = broadcast::channel(1);
    let shutdown_rx = shutdown_tx.subscribe();

    tokio::spawn(async move {
        let _ = serve(listener, state, shutdown_rx).await;
    });

    (addr, shutdown_tx)
}

fn universe() -> Arc<PairUniverse> {
    Arc::new(PairUniverse::new(vec![
        "BTCUSDT".to_string(),
        "ETHUSDT".to_string(),
    ]))
}

#[tokio::test]
async fn health_503_when_publisher_missing() {
    let state = HealthState {
        publisher: None,
        ingest: Arc::new(IngestStats::default()),
        universe: universe(),
    };
    let (addr, shutdown) = spawn_surface(state).await;

    let resp = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
    assert_eq!(resp.status(), 503);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["reason"], "publisher not initialized");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn health_503_when_broker_down() {
    let state = HealthState {
        publisher: Some(Arc::new(DeadBrokerSink {
            stats: PublisherStats::default(),
        })),
        ingest: Arc::new(IngestStats::default()),
        universe: universe(),
    };
    let (addr, shutdown) = spawn_surface(state).await;

    let resp = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
    assert_eq!(resp.status(), 503);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["reason"], "broker not connected");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn health_503_when_no_active_connections() {
    let state = HealthState {
        publisher: Some(Arc::new(MemorySink::new(100))),
        ingest: Arc::new(IngestStats::default()),
        universe: universe(),
    };
    let (addr, shutdown) = spawn_surface(state).await;

    let resp = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
    assert_eq!(resp.status(), 503);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["reason"], "no active websocket connections");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn health_200_when_streaming() {
    let ingest = Arc::new(IngestStats::default());
    ingest.connection_up();
    ingest.connection_up();

    let state = HealthState {
        publisher: Some(Arc::new(MemorySink::new(100))),
        ingest,
        universe: universe(),
    };
    let (addr, shutdown) = spawn_surface(state).await;

    let resp = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["broker"], "connected");
    assert_eq!(body["websocket_connections"], 2);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn stats_merges_publisher_ingest_and_pairs() {
    let ingest = Arc::new(IngestStats::default());
    ingest.connection_up();
    ingest.record_message();
    ingest.record_message();

    let state = HealthState {
        publisher: Some(Arc::new(MemorySink::new(100))),
        ingest,
        universe: universe(),
    };
    let (addr, shutdown) = spawn_surface(state).await;

    let resp = reqwest::get(format!("http://{}/stats", addr)).await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["ingest"]["total_messages"], 2);
    assert_eq!(body["ingest"]["active_connections"], 1);
    assert_eq!(body["publisher"]["publish_count"], 0);
    assert_eq!(body["pairs_count"], 2);
    assert_eq!(body["pairs_sample"].as_array().unwrap().len(), 2);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn pairs_returns_working_set() {
    let state = HealthState {
        publisher: None,
        ingest: Arc::new(IngestStats::default()),
        universe: universe(),
    };
    let (addr, shutdown) = spawn_surface(state).await;

    let resp = reqwest::get(format!("http://{}/pairs", addr)).await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 2);
    assert_eq!(body["pairs"][0], "BTCUSDT");
    assert_eq!(body["pairs"][1], "ETHUSDT");

    let _ = shutdown.send(());
}
