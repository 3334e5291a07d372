//! The immutable bar emitted by a bar builder and persisted by the store.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// EWMA threshold state for the adaptive (information-driven) bar families.
/// Carried inside [`Bar::metadata`] of the most recently emitted bar of a
/// family; absent for the four fixed-threshold families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarMetadata {
    pub ewma_expected: Decimal,
    pub ewma_window: u32,
    pub ewma_bar_count: u64,
    /// `+1`, `-1`, or `0` (no trades seen yet / carried from a cold start).
    pub last_trade_sign: i8,
}

/// An emitted, immutable bar.
///
/// Uniqueness key: `(bar_type, source, pair, time_start)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub time_start: DateTime<Utc>,
    pub time_end: DateTime<Utc>,
    pub bar_type: String,
    pub source: String,
    pub pair: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub vwap: Decimal,
    pub volume: Decimal,
    pub dollar_volume: Decimal,
    pub tick_count: u64,
    pub metadata: Option<BarMetadata>,
}

impl Bar {
    pub fn time_span(&self) -> Duration {
        self.time_end - self.time_start
    }

    /// `pair` lowercased with non-alphanumerics replaced by `_`, used to
    /// name the per-`(bar_type, pair)` physical store table.
    pub fn pair_slug(pair: &str) -> String {
        pair.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_slug_replaces_non_alphanumerics() {
        assert_eq!(Bar::pair_slug("ETH-USD"), "eth_usd");
        assert_eq!(Bar::pair_slug("BTC/USDT"), "btc_usdt");
    }
}
