//! In-memory sink
//!
//! Mirrors the stream publisher against process memory. Backs `--dry-run`
//! serving and tests; enforces the cap exactly rather than approximately.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use super::{PublisherStats, PublisherStatsSnapshot, TradeSink};
use crate::schema::NormalizedTrade;

/// In-memory trade sink
pub struct MemorySink {
    streams: Mutex<HashMap<String, VecDeque<Vec<(String, String)>>>>,
    max_stream_len: usize,
    stats: PublisherStats,
}

impl MemorySink {
    pub fn new(max_stream_len: usize) -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
            max_stream_len,
            stats: PublisherStats::default(),
        }
    }

    /// Records for one pair, oldest first.
    pub fn records(&self, pair: &str) -> Vec<Vec<(String, String)>> {
        self.streams
            .lock()
            .get(&pair.to_uppercase())
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of pairs with at least one record.
    pub fn pair_count(&self) -> usize {
        self.streams.lock().len()
    }
}

#[async_trait]
impl TradeSink for MemorySink {
    async fn publish(&self, pair: &str, trade: &NormalizedTrade) -> bool {
        let fields: Vec<(String, String)> = trade
            .record_fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        let mut streams = self.streams.lock();
        let entries = streams.entry(pair.to_uppercase()).or_default();
        entries.push_back(fields);
        while entries.len() > self.max_stream_len {
            entries.pop_front();
        }

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
