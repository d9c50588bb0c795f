//! Stream publishing
//!
//! [`TradeSink`] is the seam between ingestion and the backing log. The
//! Redis implementation appends to a capped stream per pair; the in-memory
//! implementation backs dry runs and tests.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

use crate::schema::NormalizedTrade;

pub mod memory;
pub mod stream;

pub use memory::MemorySink;
pub use stream::RedisStreamPublisher;

/// Publisher error types
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

pub type PublishResult<T> = Result<T, PublishError>;

/// Sink for normalized trades.
#[async_trait]
pub trait TradeSink: Send + Sync {
    /// Append one trade to the pair's log.
    ///
    /// Returns `false` on failure; implementations log and count the error
    /// instead of propagating, so the calling connection loop keeps
    /// consuming.
    async fn publish(&self, pair: &str, trade: &NormalizedTrade) -> bool;

    /// Liveness of the backing connection.
    async fn is_healthy(&self) -> bool;

    /// Publish counters.
    fn stats(&self) -> PublisherStatsSnapshot;
}

/// Shared publish counters.
#[derive(Debug, Default)]
pub struct PublisherStats {
    published: AtomicU64,
    errors: AtomicU64,
}

impl PublisherStats {
    pub fn record_publish(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time view of the counters.
    pub fn snapshot(&self) -> PublisherStatsSnapshot {
        let publish_count = self.published.load(Ordering::Relaxed);
        let error_count = self.errors.load(Ordering::Relaxed);
        let total = publish_count + error_count;
        let error_rate = if total == 0 {
            0.0
        } else {
            error_count as f64 / total as f64
        };

        PublisherStatsSnapshot {
            publish_count,
            error_count,
            error_rate,
        }
    }
}

/// Point-in-time view of [`PublisherStats`].
#[derive(Debug, Clone, Serialize)]
pub struct PublisherStatsSnapshot {
    pub publish_count: u64,
    pub error_count: u64,
    pub error_rate: f64,
}
