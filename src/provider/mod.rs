//! Exchange feed providers
//!
//! Implements ingestion from exchange real-time feeds. Binance is the only
//! provider; its frames are normalized before reaching the publisher.

use thiserror::Error;

pub mod binance;

/// Ingestion error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum IngestError {
    /// Transport-level failure; retried with bounded backoff.
    #[error("connection error: {0}")]
    Connection(String),

    /// Malformed inbound payload; the frame is dropped, the connection lives.
    #[error("parse error: {0}")]
    Parse(String),
}

pub type IngestResult<T> = Result<T, IngestError>;
