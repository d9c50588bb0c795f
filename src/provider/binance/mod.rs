//! Binance live trade feed
//!
//! Frame types, normalization, and the chunked connection supervisor.

pub mod client;
pub mod normalizer;
pub mod types;

pub use client::{
    BinanceIngestClient, ConnectionHandle, ConnectionPhase, IngestStats, IngestStatsSnapshot,
};
pub use normalizer::{convert, EXCHANGE};
pub use types::{stream_url, BinanceTradeFrame};
