//! Normalized market data types
//!
//! These types represent the canonical format for all trade data in the
//! system. Exchange-specific frames are normalized to these types before
//! publishing.

pub mod trade;

pub use trade::{NormalizedTrade, TradeSide, RAW_PAYLOAD_MAX};
