//! Binance frame normalization
//!
//! Pure conversion from raw frame text to [`NormalizedTrade`]. No side
//! effects; counters and logging belong to the connection loop.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::provider::{IngestError, IngestResult};
use crate::schema::{NormalizedTrade, TradeSide};

use super::types::BinanceTradeFrame;

/// Exchange identifier stamped onto every normalized trade.
pub const EXCHANGE: &str = "BINANCE";

/// Convert one raw frame into a normalized trade.
///
/// Returns `Ok(None)` for non-trade events (subscription confirmations,
/// depth updates, ...); those are skipped without counting as errors.
/// `Err` means the payload was malformed and should be counted and dropped.
pub fn convert(text: &str) -> IngestResult<Option<NormalizedTrade>> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| IngestError::Parse(format!("invalid JSON: {}", e)))?;

    // Combined streams wrap the payload in {"stream": ..., "data": {...}}
    let payload = value.get("data").unwrap_or(&value);

    match payload.get("e").and_then(|e| e.as_str()) {
        Some("trade") => {}
        _ => return Ok(None),
    }

    let frame: BinanceTradeFrame = serde_json::from_value(payload.clone())
        .map_err(|e| IngestError::Parse(format!("bad trade frame: {}", e)))?;

    let price = parse_positive_decimal(&frame.price, "price")?;
    let quantity = parse_positive_decimal(&frame.quantity, "quantity")?;

    let timestamp = match frame.trade_time {
        Some(ms) => DateTime::from_timestamp_millis(ms as i64)
            .ok_or_else(|| IngestError::Parse(format!("invalid trade time {}", ms)))?,
        None => Utc::now(),
    };

    // Buyer-as-maker means the seller was the aggressor.
    let side = if frame.is_buyer_maker {
        TradeSide::Sell
    } else {
        TradeSide::Buy
    };

    Ok(Some(NormalizedTrade::new(
        EXCHANGE,
        frame.symbol,
        price,
        quantity,
        timestamp,
        side,
        frame.trade_id.to_string(),
        text,
    )))
}

fn parse_positive_decimal(raw: &str, field: &str) -> IngestResult<Decimal> {
    let value = Decimal::from_str(raw)
        .map_err(|e| IngestError::Parse(format!("invalid {} '{}': {}", field, raw, e)))?;

    if value <= Decimal::ZERO {
        return Err(IngestError::Parse(format!(
            "{} must be positive: {}",
            field, raw
        )));
    }

    Ok(value)
}
