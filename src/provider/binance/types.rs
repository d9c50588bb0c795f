//! Binance message types
//!
//! Types for deserializing Binance WebSocket trade frames.

use serde::Deserialize;

/// Binance trade payload
///
/// A frame without an event time still normalizes; ingestion time is
/// substituted during conversion.
#[derive(Debug, Deserialize, Clone)]
pub struct BinanceTradeFrame {
    /// Event type, `"trade"` for execution events
    #[serde(rename = "e")]
    pub event_type: String,

    /// Symbol
    #[serde(rename = "s")]
    pub symbol: String,

    /// Price
    #[serde(rename = "p")]
    pub price: String,

    /// Quantity
    #[serde(rename = "q")]
    pub quantity: String,

    /// Trade time (epoch milliseconds)
    #[serde(rename = "T")]
    pub trade_time: Option<u64>,

    /// Is the buyer the market maker?
    #[serde(rename = "m")]
    pub is_buyer_maker: bool,

    /// Trade ID
    #[serde(rename = "t")]
    pub trade_id: u64,
}

/// Build the combined-stream endpoint URL for one chunk of pairs.
///
/// Produces `{base}/stream?streams=btcusdt@trade/ethusdt@trade/...`.
pub fn stream_url(ws_base: &str, pairs: &[String]) -> String {
    let streams: Vec<String> = pairs
        .iter()
        .map(|p| format!("{}@trade", p.to_lowercase()))
        .collect();

    format!(
        "{}/stream?streams={}",
        ws_base.trim_end_matches('/'),
        streams.join("/")
    )
}
