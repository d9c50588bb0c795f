//! Redis stream publisher
//!
//! Appends normalized trades to per-pair capped streams
//! (`XADD trades:<PAIR> MAXLEN ~ <cap> * ...`). Oldest entries are
//! discarded by the broker once a stream exceeds the cap.

use redis::aio::MultiplexedConnection;
use redis::streams::{StreamMaxlen, StreamRangeReply};
use redis::AsyncCommands;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error};

use super::{PublishError, PublishResult, PublisherStats, PublisherStatsSnapshot, TradeSink};
use crate::schema::NormalizedTrade;

/// Key prefix for per-pair trade streams.
const STREAM_PREFIX: &str = "trades:";

/// Redis stream publisher
///
/// The connection is a single shared handle used concurrently by every
/// connection task; each publish targets an independent stream key, so the
/// mutex is the only ordering coordination needed.
pub struct RedisStreamPublisher {
    #[allow(dead_code)] // Keep client alive to maintain connection
    client: redis::Client,
    connection: Mutex<MultiplexedConnection>,
    max_stream_len: usize,
    stats: PublisherStats,
}

impl RedisStreamPublisher {
    /// Connect to Redis and prepare the shared connection handle.
    ///
    /// The connection is released when the publisher is dropped.
    pub async fn connect(redis_url: &str, max_stream_len: usize) -> PublishResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let connection = client.get_multiplexed_async_connection().await?;

        debug!("connected to redis at {}", redis_url);

        Ok(Self {
            client,
            connection: Mutex::new(connection),
            max_stream_len,
            stats: PublisherStats::default(),
        })
    }

    /// Stream key for a pair.
    pub fn stream_key(pair: &str) -> String {
        format!("{}{}", STREAM_PREFIX, pair.to_uppercase())
    }

    /// Read back the most recent records of one pair's stream, oldest first.
    pub async fn recent(
        &self,
        pair: &str,
        limit: usize,
    ) -> PublishResult<Vec<Vec<(String, String)>>> {
        let key = Self::stream_key(pair);
        let mut conn = self.connection.lock().await;

        let reply: StreamRangeReply = conn.xrevrange_count(&key, "+", "-", limit).await?;

        let mut rows = Vec::with_capacity(reply.ids.len());
        for entry in reply.ids.into_iter().rev() {
            let mut fields = Vec::with_capacity(entry.map.len());
            for (name, value) in entry.map {
                let value: String = redis::from_redis_value(&value).map_err(PublishError::Redis)?;
                fields.push((name, value));
            }
            rows.push(fields);
        }

        Ok(rows)
    }
}

#[async_trait]
impl TradeSink for RedisStreamPublisher {
    async fn publish(&self, pair: &str, trade: &NormalizedTrade) -> bool {
        let key = Self::stream_key(pair);
        let fields = trade.record_fields();

        let mut conn = self.connection.lock().await;
        let result: redis::RedisResult<String> = conn
            .xadd_maxlen(&key, StreamMaxlen::Approx(self.max_stream_len), "*", &fields)
            .await;

        match result {
            Ok(_) => {
                self.stats.record_publish();
                true
            }
            Err(e) => {
                self.stats.record_error();
                error!("failed to append to {}: {}", key, e);
                false
            }
        }
    }

    async fn is_healthy(&self) -> bool {
        let mut conn = self.connection.lock().await;
        let pong: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut *conn).await;
        matches!(pong, Ok(ref reply) if reply == "PONG")
    }

    fn stats(&self) -> PublisherStatsSnapshot {
        self.stats.snapshot()
    }
}
