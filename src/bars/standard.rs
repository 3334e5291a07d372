//! The four fixed-threshold bar families: tick, volume, dollar, time.

use rust_decimal::Decimal;

use crate::core::{Accumulator, Bar, Trade};

use super::BarBuilder;

enum Threshold {
    Tick(u64),
    Volume(Decimal),
    Dollar(Decimal),
    /// Epoch-anchored clock period, in whole seconds. Buckets are
    /// `[k*period, (k+1)*period)` counted from the UTC epoch.
    Time(i64),
}

/// Builder shared by the four fixed-threshold families; the emission
/// predicate differs only by `Threshold` variant.
pub struct StandardBarBuilder {
    bar_type: String,
    source: String,
    pair: String,
    threshold: Threshold,
    acc: Accumulator,
}

impl StandardBarBuilder {
    fn new(bar_type: String, source: impl Into<String>, pair: impl Into<String>, threshold: Threshold) -> Self {
        Self {
            bar_type,
            source: source.into(),
            pair: pair.into(),
            threshold,
            acc: Accumulator::new(),
        }
    }

    pub fn tick(n: u64, source: impl Into<String>, pair: impl Into<String>) -> Self {
        Self::new(format!("tick_{n}"), source, pair, Threshold::Tick(n))
    }

    pub fn volume(v: Decimal, source: impl Into<String>, pair: impl Into<String>) -> Self {
        Self::new(format!("volume_{v}"), source, pair, Threshold::Volume(v))
    }

    pub fn dollar(d: Decimal, source: impl Into<String>, pair: impl Into<String>) -> Self {
        Self::new(format!("dollar_{d}"), source, pair, Threshold::Dollar(d))
    }

    pub fn time(bar_type: String, period_secs: i64, source: impl Into<String>, pair: impl Into<String>) -> Self {
        Self::new(bar_type, source, pair, Threshold::Time(period_secs))
    }

    fn emit_and_reset(&mut self) -> Bar {
        let bar = self.acc.emit_bar(self.bar_type.clone(), self.source.clone(), self.pair.clone(), None);
        self.acc.reset();
        bar
    }

    /// `floor(timestamp_seconds / period)`, matching `chrono`'s
    /// `div_euclid` so pre-epoch timestamps still bucket consistently.
    fn bucket_index(ts: chrono::DateTime<chrono::Utc>, period_secs: i64) -> i64 {
        ts.timestamp().div_euclid(period_secs)
    }
}

impl BarBuilder for StandardBarBuilder {
    fn bar_type(&self) -> &str {
        &self.bar_type
    }

    fn process_trade(&mut self, trade: &Trade) -> Option<Bar> {
        match self.threshold {
            Threshold::Tick(n) => {
                self.acc.add(trade);
                (self.acc.tick_count >= n).then(|| self.emit_and_reset())
            }
            Threshold::Volume(v) => {
                self.acc.add(trade);
                (self.acc.volume >= v).then(|| self.emit_and_reset())
            }
            Threshold::Dollar(d) => {
                self.acc.add(trade);
                (self.acc.dollar_volume >= d).then(|| self.emit_and_reset())
            }
            Threshold::Time(period_secs) => {
                let new_bucket = Self::bucket_index(trade.timestamp, period_secs);
                if !self.acc.is_empty() {
                    let current_bucket = Self::bucket_index(
                        self.acc.time_start.expect("non-empty accumulator has time_start"),
                        period_secs,
                    );
                    if new_bucket > current_bucket {
                        let bar = self.emit_and_reset();
                        self.acc.add(trade);
                        return Some(bar);
                    }
                }
                self.acc.add(trade);
                None
            }
        }
    }

    fn flush(&mut self) -> Option<Bar> {
        (!self.acc.is_empty()).then(|| self.emit_and_reset())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::side::Side;
    use rust_decimal_macros::dec;

    fn trade_at(price: Decimal, size: Decimal, ts_secs: i64) -> Trade {
        Trade {
            timestamp: chrono::DateTime::from_timestamp(ts_secs, 0).unwrap(),
            trade_id: ts_secs.to_string(),
            source: "coinbase".to_string(),
            pair: "ETH-USD".to_string(),
            price,
            size,
            side: Side::Buy,
        }
    }

    #[test]
    fn tick_bar_scenario_1() {
        // N=3, prices 10..16 step 1, size 1: emits (10,12) and (13,15);
        // the seventh trade stays in the accumulator until flush.
        let mut b = StandardBarBuilder::tick(3, "coinbase", "ETH-USD");
        let prices = [10, 11, 12, 13, 14, 15, 16];
        let mut bars = Vec::new();
        for (i, p) in prices.iter().enumerate() {
            if let Some(bar) = b.process_trade(&trade_at(Decimal::from(*p), dec!(1), i as i64)) {
                bars.push(bar);
            }
        }
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].open, dec!(10));
        assert_eq!(bars[0].close, dec!(12));
        assert_eq!(bars[1].open, dec!(13));
        assert_eq!(bars[1].close, dec!(15));

        let flushed = b.flush().unwrap();
        assert_eq!(flushed.open, dec!(16));
        assert_eq!(flushed.tick_count, 1);
        assert!(b.flush().is_none());
    }

    #[test]
    fn volume_bar_scenario_2() {
        let mut b = StandardBarBuilder::volume(dec!(5), "coinbase", "ETH-USD");
        assert!(b.process_trade(&trade_at(dec!(10), dec!(2), 0)).is_none());
        assert!(b.process_trade(&trade_at(dec!(11), dec!(2), 1)).is_none());
        let bar = b.process_trade(&trade_at(dec!(12), dec!(2), 2)).unwrap();
        assert_eq!(bar.volume, dec!(6));
        assert_eq!(bar.vwap, dec!(11));
    }

    #[test]
    fn dollar_bar_scenario_3() {
        let mut b = StandardBarBuilder::dollar(dec!(100), "coinbase", "ETH-USD");
        assert!(b.process_trade(&trade_at(dec!(10), dec!(5), 0)).is_none()); // 50
        let bar = b.process_trade(&trade_at(dec!(20), dec!(3), 1)).unwrap(); // +60 = 110
        assert_eq!(bar.dollar_volume, dec!(110));
        assert_eq!(bar.tick_count, 2);
        // Third trade opens the next bar.
        assert!(b.process_trade(&trade_at(dec!(50), dec!(2), 2)).is_none());
    }

    #[test]
    fn time_bar_scenario_4() {
        let bar_type = crate::bars::spec::BarSpec::Time { period_secs: 60 }.bar_type();
        let mut b = StandardBarBuilder::time(bar_type, 60, "coinbase", "ETH-USD");
        assert!(b.process_trade(&trade_at(dec!(1), dec!(1), 0)).is_none());
        assert!(b.process_trade(&trade_at(dec!(1), dec!(1), 30)).is_none());
        // t=90 belongs to [60,120), different bucket from [0,60): emits [0,60)
        let bar1 = b.process_trade(&trade_at(dec!(1), dec!(1), 90)).unwrap();
        assert_eq!(bar1.tick_count, 2);
        // t=120 belongs to [120,180): emits [60,120) with the single t=90 trade
        let bar2 = b.process_trade(&trade_at(dec!(1), dec!(1), 120)).unwrap();
        assert_eq!(bar2.tick_count, 1);
        let flushed = b.flush().unwrap();
        assert_eq!(flushed.tick_count, 1);
    }
}
