//! Normalized trade types
//!
//! Canonical representation of a single execution event, plus the flattened
//! string-keyed record form appended to the per-pair streams.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Maximum number of raw payload characters carried on a normalized trade.
pub const RAW_PAYLOAD_MAX: usize = 512;

/// Trade side (aggressor side)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// Wire representation used in stream records.
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "BUY" | "B" => Some(TradeSide::Buy),
            "SELL" | "S" => Some(TradeSide::Sell),
            _ => None,
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized trade data
///
/// Price and quantity are carried as [`Decimal`], parsed from the exchange's
/// decimal strings and re-serialized as strings. The timestamp is always
/// populated; ingestion time is substituted when the source omits it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedTrade {
    /// Exchange identifier (e.g., "BINANCE")
    pub exchange: String,
    /// Trading pair, such as "BTCUSDT"
    pub pair: String,
    /// Trade price
    pub price: Decimal,
    /// Trade quantity
    pub quantity: Decimal,
    /// Event timestamp
    pub timestamp: DateTime<Utc>,
    /// Trade side (aggressor side)
    pub side: TradeSide,
    /// Exchange-assigned trade ID
    pub trade_id: String,
    /// Truncated raw payload, kept for debugging downstream
    pub raw: String,
}

impl NormalizedTrade {
    /// Create a new normalized trade, truncating the raw payload.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        exchange: impl Into<String>,
        pair: impl Into<String>,
        price: Decimal,
        quantity: Decimal,
        timestamp: DateTime<Utc>,
        side: TradeSide,
        trade_id: impl Into<String>,
        raw: &str,
    ) -> Self {
        let raw = if raw.len() > RAW_PAYLOAD_MAX {
            raw.chars().take(RAW_PAYLOAD_MAX).collect()
        } else {
            raw.to_string()
        };

        Self {
            exchange: exchange.into(),
            pair: pair.into().to_uppercase(),
            price,
            quantity,
            timestamp,
            side,
            trade_id: trade_id.into(),
            raw,
        }
    }

    /// Flatten to the string-keyed field list appended to the stream.
    ///
    /// Every value is stringified; this is the persisted record format.
    pub fn record_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("exchange", self.exchange.clone()),
            ("pair", self.pair.clone()),
            ("price", self.price.to_string()),
            ("quantity", self.quantity.to_string()),
            ("timestamp", self.timestamp.to_rfc3339()),
            ("side", self.side.as_str().to_string()),
            ("trade_id", self.trade_id.clone()),
            ("raw", self.raw.clone()),
        ]
    }
}
