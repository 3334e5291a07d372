//! Trade source: the boundary between the pipeline and an exchange's public
//! trade-history API.

pub mod exchange;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::core::Trade;

/// Errors a `TradeSource` may surface. Only [`SourceError::Transient`] is
/// retried internally (exponential backoff, per the retry ladder); the rest
/// are fatal to the enclosing window.
#[derive(Error, Debug)]
pub enum SourceError {
    /// HTTP 5xx, connection error, or rate-limit response, after the retry
    /// ladder is exhausted.
    #[error("transient fetch failure for {pair} [{start}, {end}): {message}")]
    Transient {
        pair: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        message: String,
    },

    /// A single instant holds >= `PAGE_LIMIT` trades, so the backward-page
    /// cursor cannot advance. Pragmatically unreachable at the window sizes
    /// this pipeline uses, but must be surfaced rather than looping forever.
    #[error("window [{start}, {end}) for {pair} is too busy to page through at limit {limit}")]
    WindowTooBusy {
        pair: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    },

    /// Response body did not parse as the expected schema.
    #[error("protocol violation fetching {pair}: {message}")]
    Protocol { pair: String, message: String },
}

/// Produces trades for a `(pair, [start, end))` window, deduplicated by
/// `trade_id`, sorted ascending by timestamp.
#[async_trait]
pub trait TradeSource: Send + Sync {
    /// Every trade with `start <= timestamp < end`, ascending.
    async fn fetch_window(
        &self,
        pair: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Trade>, SourceError>;

    /// Pairs this source is configured to serve, for input validation at the
    /// command surface.
    fn supported_pairs(&self) -> &[String];
}
