//! The immutable trade record produced by a `TradeSource` and persisted
//! exactly once into the trade log.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::side::Side;

/// A single tick-level trade.
///
/// `(source, trade_id)` is globally unique; this is the dedup key used both
/// by `TradeSource::fetch_window` page-boundary deduplication and by the
/// store's `raw_trades` uniqueness constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: DateTime<Utc>,
    pub trade_id: String,
    pub source: String,
    pub pair: String,
    pub price: Decimal,
    pub size: Decimal,
    pub side: Side,
}

impl Trade {
    /// `price * size`, the quote-currency notional of this trade.
    pub fn dollar_value(&self) -> Decimal {
        self.price * self.size
    }
}
