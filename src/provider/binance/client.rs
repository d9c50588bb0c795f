//! Binance ingestion client
//!
//! Splits the working set into connection-sized chunks and supervises one
//! WebSocket task per chunk. Each task owns its reconnect/backoff cycle;
//! one chunk going terminal never affects its siblings.

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::config::IngestSettings;
use crate::provider::{IngestError, IngestResult};
use crate::publisher::TradeSink;

use super::normalizer::convert;
use super::types::stream_url;

/// Lifecycle of one chunk connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Opening the transport
    Connecting,
    /// Connected and reading frames
    Streaming,
    /// Waiting out a reconnect delay
    Backoff { attempt: u32 },
    /// Retries exhausted; terminal until process restart
    Failed,
    /// Graceful shutdown
    Stopped,
}

/// Shared per-connection state, readable from outside the task.
pub struct ConnectionHandle {
    /// Connection index within the client
    pub id: usize,
    /// Pair subset assigned to this connection
    pub pairs: Vec<String>,
    phase: parking_lot::RwLock<ConnectionPhase>,
    messages: AtomicU64,
    errors: AtomicU64,
}

impl ConnectionHandle {
    pub fn new(id: usize, pairs: Vec<String>) -> Self {
        Self {
            id,
            pairs,
            phase: parking_lot::RwLock::new(ConnectionPhase::Connecting),
            messages: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> ConnectionPhase {
        self.phase.read().clone()
    }

    fn set_phase(&self, phase: ConnectionPhase) {
        *self.phase.write() = phase;
    }

    /// Messages normalized and handed to the sink by this connection.
    pub fn messages(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }

    /// Malformed frames dropped by this connection.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

/// Shared ingestion counters, updated from every connection task.
#[derive(Debug, Default)]
pub struct IngestStats {
    active_connections: AtomicUsize,
    total_messages: AtomicU64,
    error_messages: AtomicU64,
    connection_errors: AtomicU64,
}

impl IngestStats {
    pub fn connection_up(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_down(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_message(&self) {
        self.total_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.error_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time view of the counters.
    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            active_connections: self.active_connections.load(Ordering::Relaxed),
            total_messages: self.total_messages.load(Ordering::Relaxed),
            error_messages: self.error_messages.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`IngestStats`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestStatsSnapshot {
    pub active_connections: usize,
    pub total_messages: u64,
    pub error_messages: u64,
    pub connection_errors: u64,
}

#[derive(Debug, Clone)]
struct ReconnectPolicy {
    base: Duration,
    max_delay: Duration,
    max_retries: u32,
}

/// Binance ingestion client
pub struct BinanceIngestClient {
    ws_url: String,
    pairs_per_connection: usize,
    reconnect: ReconnectPolicy,
    sink: Arc<dyn TradeSink>,
    stats: Arc<IngestStats>,
    connections: parking_lot::Mutex<Vec<Arc<ConnectionHandle>>>,
}

impl BinanceIngestClient {
    /// Create a new client publishing into `sink`.
    pub fn new(settings: &IngestSettings, ws_url: impl Into<String>, sink: Arc<dyn TradeSink>) -> Self {
        Self {
            ws_url: ws_url.into(),
            pairs_per_connection: settings.pairs_per_connection,
            reconnect: ReconnectPolicy {
                base: settings.backoff_base(),
                max_delay: settings.backoff_max(),
                max_retries: settings.max_retries,
            },
            sink,
            stats: Arc::new(IngestStats::default()),
            connections: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Split a pair list into connection-sized chunks.
    ///
    /// A zero chunk size collapses to a single connection.
    pub fn chunk_pairs(pairs: &[String], size: usize) -> Vec<Vec<String>> {
        if size == 0 {
            return vec![pairs.to_vec()];
        }
        pairs.chunks(size).map(|c| c.to_vec()).collect()
    }

    /// Spawn one supervised connection task per chunk of `pairs`.
    ///
    /// Returns the task handles; the caller awaits them after shutdown.
    pub fn start(
        &self,
        pairs: &[String],
        shutdown: &broadcast::Sender<()>,
    ) -> Vec<JoinHandle<()>> {
        let chunks = Self::chunk_pairs(pairs, self.pairs_per_connection);
        info!(
            "starting {} connections for {} pairs ({} per connection)",
            chunks.len(),
            pairs.len(),
            self.pairs_per_connection
        );

        let mut tasks = Vec::with_capacity(chunks.len());
        let mut connections = self.connections.lock();
        connections.clear();

        for (id, chunk) in chunks.into_iter().enumerate() {
            let url = stream_url(&self.ws_url, &chunk);
            let handle = Arc::new(ConnectionHandle::new(id, chunk));
            connections.push(Arc::clone(&handle));

            tasks.push(tokio::spawn(run_connection(
                handle,
                url,
                self.reconnect.clone(),
                Arc::clone(&self.sink),
                Arc::clone(&self.stats),
                shutdown.subscribe(),
            )));
        }

        tasks
    }

    /// Snapshot of the aggregate counters.
    pub fn stats(&self) -> IngestStatsSnapshot {
        self.stats.snapshot()
    }

    /// Shared counter handle, for the health surface.
    pub fn stats_handle(&self) -> Arc<IngestStats> {
        Arc::clone(&self.stats)
    }

    /// Handles for the currently supervised connections.
    pub fn connections(&self) -> Vec<Arc<ConnectionHandle>> {
        self.connections.lock().clone()
    }
}

/// Un-jittered exponential backoff, capped at `max_delay`.
pub fn backoff_delay(base: Duration, retry_count: u32, max_delay: Duration) -> Duration {
    let exp = base.saturating_mul(2u32.saturating_pow(retry_count.min(31)));
    exp.min(max_delay)
}

/// Backoff with additive uniform jitter in `[0, 10%)` of the delay.
fn backoff_with_jitter(base: Duration, retry_count: u32, max_delay: Duration) -> Duration {
    let delay = backoff_delay(base, retry_count, max_delay);
    let jitter = delay.mul_f64(rand::thread_rng().gen_range(0.0..0.1));
    delay + jitter
}

enum SessionEnd {
    /// Shutdown signal received while streaming
    Shutdown,
    /// Server closed the connection or the stream ended
    Disconnected,
}

/// Supervise one connection until shutdown or retry exhaustion.
async fn run_connection(
    handle: Arc<ConnectionHandle>,
    url: String,
    reconnect: ReconnectPolicy,
    sink: Arc<dyn TradeSink>,
    stats: Arc<IngestStats>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut retry_count: u32 = 0;

    loop {
        if shutdown_rx.try_recv().is_ok() {
            handle.set_phase(ConnectionPhase::Stopped);
            return;
        }

        handle.set_phase(ConnectionPhase::Connecting);

        let outcome = connect_and_stream(
            &handle,
            &url,
            sink.as_ref(),
            &stats,
            &mut retry_count,
            &mut shutdown_rx,
        )
        .await;

        match outcome {
            Ok(SessionEnd::Shutdown) => {
                info!("connection {} stopped", handle.id);
                handle.set_phase(ConnectionPhase::Stopped);
                return;
            }
            Ok(SessionEnd::Disconnected) => {
                warn!("connection {} disconnected by server", handle.id);
                stats.record_connection_error();
            }
            Err(e) => {
                warn!("connection {} failed: {}", handle.id, e);
                stats.record_connection_error();
            }
        }

        if retry_count >= reconnect.max_retries {
            error!(
                "connection {} abandoned after {} retries ({} pairs dark until restart)",
                handle.id,
                reconnect.max_retries,
                handle.pairs.len()
            );
            handle.set_phase(ConnectionPhase::Failed);
            return;
        }

        let delay = backoff_with_jitter(reconnect.base, retry_count, reconnect.max_delay);
        handle.set_phase(ConnectionPhase::Backoff { attempt: retry_count });
        warn!(
            "connection {} reconnecting in {:?} (attempt {}/{})",
            handle.id,
            delay,
            retry_count + 1,
            reconnect.max_retries
        );
        retry_count += 1;

        tokio::select! {
            _ = sleep(delay) => {}
            _ = shutdown_rx.recv() => {
                info!("connection {} stopped during backoff", handle.id);
                handle.set_phase(ConnectionPhase::Stopped);
                return;
            }
        }
    }
}

/// Open the transport and read frames until the session ends.
async fn connect_and_stream(
    handle: &ConnectionHandle,
    url: &str,
    sink: &dyn TradeSink,
    stats: &IngestStats,
    retry_count: &mut u32,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> IngestResult<SessionEnd> {
    let (ws_stream, _) = connect_async(url)
        .await
        .map_err(|e| IngestError::Connection(format!("failed to connect: {}", e)))?;

    debug!("connection {} established ({} pairs)", handle.id, handle.pairs.len());
    *retry_count = 0;
    handle.set_phase(ConnectionPhase::Streaming);
    stats.connection_up();

    let (mut write, mut read) = ws_stream.split();

    let result = loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(text.as_str(), handle, sink, stats).await;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if let Err(e) = write.send(Message::Pong(payload)).await {
                            warn!("connection {} failed to send pong: {}", handle.id, e);
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        break Ok(SessionEnd::Disconnected);
                    }
                    Some(Err(e)) => {
                        break Err(IngestError::Connection(e.to_string()));
                    }
                    None => {
                        break Ok(SessionEnd::Disconnected);
                    }
                    _ => {}
                }
            }
            _ = shutdown_rx.recv() => {
                if let Err(e) = write.send(Message::Close(None)).await {
                    debug!("connection {} failed to send close frame: {}", handle.id, e);
                }
                break Ok(SessionEnd::Shutdown);
            }
        }
    };

    stats.connection_down();
    result
}

/// Process one text frame: convert, publish, account.
///
/// Malformed frames are counted and dropped; the connection never closes
/// over a single bad message. Non-trade events are skipped silently.
pub(crate) async fn handle_frame(
    text: &str,
    handle: &ConnectionHandle,
    sink: &dyn TradeSink,
    stats: &IngestStats,
) {
    match convert(text) {
        Ok(Some(trade)) => {
            stats.record_message();
            handle.messages.fetch_add(1, Ordering::Relaxed);

            let pair = trade.pair.clone();
            if !sink.publish(&pair, &trade).await {
                debug!("publish failed for {}", pair);
            }
        }
        Ok(None) => {
            // Non-trade event
        }
        Err(e) => {
            stats.record_error();
            handle.errors.fetch_add(1, Ordering::Relaxed);
            warn!("connection {} dropping malformed frame: {}", handle.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::{PublisherStats, PublisherStatsSnapshot};
    use crate::schema::NormalizedTrade;
    use async_trait::async_trait;
    use std::collections::HashSet;

    struct RecordingSink {
        records: parking_lot::Mutex<Vec<(String, NormalizedTrade)>>,
        stats: PublisherStats,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                records: parking_lot::Mutex::new(Vec::new()),
                stats: PublisherStats::default(),
            }
        }
    }

    #[async_trait]
    impl TradeSink for RecordingSink {
        async fn publish(&self, pair: &str, trade: &NormalizedTrade) -> bool {
            self.records.lock().push((pair.to_string(), trade.clone()));
            self.stats.record_publish();
            true
        }

        async fn is_healthy(&self) -> bool {
            true
        }

        fn stats(&self) -> PublisherStatsSnapshot {
            self.stats.snapshot()
        }
    }

    fn pairs(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("PAIR{}USDT", i)).collect()
    }

    fn trade_frame(trade_id: u64) -> String {
        format!(
            r#"{{"e":"trade","s":"BTCUSDT","t":{},"p":"50000.00","q":"0.001","T":1672515782136,"m":false}}"#,
            trade_id
        )
    }

    #[test]
    fn test_chunk_count_is_ceiling() {
        assert_eq!(BinanceIngestClient::chunk_pairs(&pairs(120), 50).len(), 3);
        assert_eq!(BinanceIngestClient::chunk_pairs(&pairs(100), 50).len(), 2);
        assert_eq!(BinanceIngestClient::chunk_pairs(&pairs(1), 50).len(), 1);
        assert!(BinanceIngestClient::chunk_pairs(&pairs(0), 50).is_empty());
    }

    #[test]
    fn test_chunks_reconstruct_original_set() {
        let original = pairs(123);
        let chunks = BinanceIngestClient::chunk_pairs(&original, 50);

        let flattened: Vec<String> = chunks.into_iter().flatten().collect();
        assert_eq!(flattened, original);

        let unique: HashSet<&String> = flattened.iter().collect();
        assert_eq!(unique.len(), original.len());
    }

    #[test]
    fn test_chunk_size_zero_collapses_to_one() {
        let chunks = BinanceIngestClient::chunk_pairs(&pairs(10), 0);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 10);
    }

    #[test]
    fn test_backoff_lower_bound_doubles() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(60);

        assert_eq!(backoff_delay(base, 0, max), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 1, max), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 2, max), Duration::from_secs(4));
        assert_eq!(backoff_delay(base, 5, max), Duration::from_secs(32));
    }

    #[test]
    fn test_backoff_caps_at_max_delay() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(60);

        assert_eq!(backoff_delay(base, 6, max), Duration::from_secs(60));
        assert_eq!(backoff_delay(base, 30, max), Duration::from_secs(60));
        assert_eq!(backoff_delay(base, u32::MAX, max), Duration::from_secs(60));
    }

    #[test]
    fn test_backoff_non_decreasing() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(60);

        let mut previous = Duration::ZERO;
        for retry in 0..20 {
            let delay = backoff_delay(base, retry, max);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn test_jitter_within_ten_percent() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(60);

        for retry in 0..8 {
            let floor = backoff_delay(base, retry, max);
            let ceiling = floor.mul_f64(1.1);
            for _ in 0..50 {
                let jittered = backoff_with_jitter(base, retry, max);
                assert!(jittered >= floor && jittered < ceiling);
            }
        }
    }

    #[tokio::test]
    async fn test_frames_publish_in_receive_order() {
        let sink = RecordingSink::new();
        let stats = IngestStats::default();
        let handle = ConnectionHandle::new(0, vec!["BTCUSDT".to_string()]);

        for trade_id in [1u64, 2, 3] {
            handle_frame(&trade_frame(trade_id), &handle, &sink, &stats).await;
        }

        let records = sink.records.lock();
        assert_eq!(records.len(), 3);
        let ids: Vec<&str> = records.iter().map(|(_, t)| t.trade_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert!(records.iter().all(|(pair, _)| pair == "BTCUSDT"));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_messages, 3);
        assert_eq!(snapshot.error_messages, 0);
        assert_eq!(handle.messages(), 3);
    }

    #[tokio::test]
    async fn test_unknown_event_type_skipped_without_error() {
        let sink = RecordingSink::new();
        let stats = IngestStats::default();
        let handle = ConnectionHandle::new(0, vec!["BTCUSDT".to_string()]);

        handle_frame(r#"{"e":"depthUpdate"}"#, &handle, &sink, &stats).await;
        handle_frame(&trade_frame(7), &handle, &sink, &stats).await;

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_messages, 1);
        assert_eq!(snapshot.error_messages, 0);
        assert_eq!(sink.records.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_frame_counted_and_dropped() {
        let sink = RecordingSink::new();
        let stats = IngestStats::default();
        let handle = ConnectionHandle::new(0, vec!["BTCUSDT".to_string()]);

        handle_frame("{not json", &handle, &sink, &stats).await;
        handle_frame(&trade_frame(9), &handle, &sink, &stats).await;

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_messages, 1);
        assert_eq!(snapshot.error_messages, 1);
        assert_eq!(handle.errors(), 1);
        assert_eq!(sink.records.lock().len(), 1);
    }

    #[test]
    fn test_stats_snapshot_tracks_connections() {
        let stats = IngestStats::default();
        stats.connection_up();
        stats.connection_up();
        stats.connection_down();

        assert_eq!(stats.snapshot().active_connections, 1);
    }
}
