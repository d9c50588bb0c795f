//! # Data Ingestor
//!
//! Live trade ingestion service for downstream quant analytics.
//!
//! ## Features
//!
//! - **Pair discovery**: periodic computation of the instrument working set
//!   from a market-cap ranking and the exchange's tradable symbol list
//! - **Live ingestion**: chunked multiplexed WebSocket subscriptions, one
//!   supervised connection per chunk with bounded reconnect backoff
//! - **Fan-out**: normalized trades appended to bounded per-pair Redis
//!   streams (`trades:<PAIR>`, approximate MAXLEN trim)
//! - **Introspection**: HTTP health/stats/pairs surface for monitoring
//!
//! ## Architecture
//!
//! Exchange frames are normalized to [`schema::NormalizedTrade`] before
//! publishing. The publisher is behind the [`publisher::TradeSink`] trait so
//! ingestion never depends on a concrete broker. All cross-task state is
//! limited to atomic counters and the wholesale-replaced working set.

pub mod cli;
pub mod config;
pub mod health;
pub mod provider;
pub mod publisher;
pub mod schema;
pub mod symbol;

// Re-export commonly used types
pub use config::Settings;
pub use provider::binance::{BinanceIngestClient, IngestStats, IngestStatsSnapshot};
pub use provider::{IngestError, IngestResult};
pub use publisher::{MemorySink, PublisherStats, RedisStreamPublisher, TradeSink};
pub use schema::{NormalizedTrade, TradeSide};
pub use symbol::{PairDiscovery, PairUniverse};
