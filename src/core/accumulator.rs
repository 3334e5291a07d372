//! Mutable, in-memory, per-active-bar running state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::bar::{Bar, BarMetadata};
use super::trade::Trade;

/// Running OHLCV/VWAP state for the bar currently under construction.
///
/// Empty iff `tick_count == 0`. All arithmetic is exact decimal; `vwap` is
/// computed only at emission, never as a running division, to avoid
/// precision drift across thousands of incremental updates.
#[derive(Debug, Clone)]
pub struct Accumulator {
    pub tick_count: u64,
    pub volume: Decimal,
    pub dollar_volume: Decimal,
    pub vwap_numerator: Decimal,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub time_start: Option<DateTime<Utc>>,
    pub time_end: Option<DateTime<Utc>>,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            tick_count: 0,
            volume: Decimal::ZERO,
            dollar_volume: Decimal::ZERO,
            vwap_numerator: Decimal::ZERO,
            open: Decimal::ZERO,
            high: Decimal::ZERO,
            low: Decimal::ZERO,
            close: Decimal::ZERO,
            time_start: None,
            time_end: None,
        }
    }
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tick_count == 0
    }

    /// Fold a trade into the running state.
    pub fn add(&mut self, trade: &Trade) {
        if self.is_empty() {
            self.open = trade.price;
            self.high = trade.price;
            self.low = trade.price;
            self.time_start = Some(trade.timestamp);
        } else {
            if trade.price > self.high {
                self.high = trade.price;
            }
            if trade.price < self.low {
                self.low = trade.price;
            }
        }
        self.close = trade.price;
        self.time_end = Some(trade.timestamp);

        let notional = trade.dollar_value();
        self.volume += trade.size;
        self.dollar_volume += notional;
        self.vwap_numerator += notional;
        self.tick_count += 1;
    }

    /// Produce an immutable bar from the current state. Does not reset;
    /// callers that intend to start a fresh bar must call [`reset`].
    pub fn emit_bar(
        &self,
        bar_type: impl Into<String>,
        source: impl Into<String>,
        pair: impl Into<String>,
        metadata: Option<BarMetadata>,
    ) -> Bar {
        debug_assert!(!self.is_empty(), "emit_bar called on an empty accumulator");
        let vwap = if self.volume.is_zero() {
            self.close
        } else {
            self.vwap_numerator / self.volume
        };
        Bar {
            time_start: self.time_start.expect("non-empty accumulator has time_start"),
            time_end: self.time_end.expect("non-empty accumulator has time_end"),
            bar_type: bar_type.into(),
            source: source.into(),
            pair: pair.into(),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            vwap,
            volume: self.volume,
            dollar_volume: self.dollar_volume,
            tick_count: self.tick_count,
            metadata,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
