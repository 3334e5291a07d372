//! The six information-driven (adaptive) bar families: tick/volume/dollar
//! imbalance bars (`tib`/`vib`/`dib`) and tick/volume/dollar run bars
//! (`trb`/`vrb`/`drb`).
//!
//! Emission thresholds are estimated by an EWMA of prior bar statistics;
//! that state rides inside the metadata of the most recently emitted bar of
//! the family, so no separate state store is needed (§4.6, §9).

use rust_decimal::Decimal;

use crate::core::bar::BarMetadata;
use crate::core::side::{Sign, TickRule};
use crate::core::{Accumulator, Bar, Trade};

use super::BarBuilder;

/// What `unit(trade)` measures for a given family: `1` for tick families,
/// `size` for volume families, `price*size` for dollar families.
#[derive(Debug, Clone, Copy)]
pub enum Unit {
    Tick,
    Volume,
    Dollar,
}

impl Unit {
    fn measure(self, trade: &Trade) -> Decimal {
        match self {
            Unit::Tick => Decimal::ONE,
            Unit::Volume => trade.size,
            Unit::Dollar => trade.price * trade.size,
        }
    }
}

/// EWMA threshold estimator shared by both adaptive variants.
#[derive(Debug, Clone)]
struct Ewma {
    expected: Decimal,
    window: u32,
    bar_count: u64,
}

impl Ewma {
    fn new(window: u32) -> Self {
        Self {
            expected: Decimal::ZERO,
            window,
            bar_count: 0,
        }
    }

    fn seeded(window: u32, expected: Decimal, bar_count: u64) -> Self {
        Self {
            expected,
            window,
            bar_count,
        }
    }

    /// Fold a just-realized bar statistic into the estimate. `bar_count ==
    /// 0` seeds the EWMA directly with `x` rather than blending.
    fn update(&mut self, x: Decimal) {
        if self.bar_count == 0 {
            self.expected = x;
        } else {
            let alpha = Decimal::TWO / Decimal::from(self.window + 1);
            self.expected = alpha * x + (Decimal::ONE - alpha) * self.expected;
        }
        self.bar_count += 1;
    }

    fn metadata(&self, last_trade_sign: i8) -> BarMetadata {
        BarMetadata {
            ewma_expected: self.expected,
            ewma_window: self.window,
            ewma_bar_count: self.bar_count,
            last_trade_sign,
        }
    }
}

fn seed_from_prior(window: u32, prior: Option<&Bar>) -> (Ewma, Option<Sign>) {
    match prior.and_then(|b| b.metadata.as_ref()) {
        Some(meta) => {
            let sign = match meta.last_trade_sign {
                1 => Some(Sign::Up),
                -1 => Some(Sign::Down),
                _ => None,
            };
            (Ewma::seeded(window, meta.ewma_expected, meta.ewma_bar_count), sign)
        }
        None => (Ewma::new(window), None),
    }
}

/// `tib`/`vib`/`dib`: running signed imbalance `theta`, emits when `|theta|
/// >= E_theta`.
pub struct ImbalanceBarBuilder {
    bar_type: String,
    source: String,
    pair: String,
    unit: Unit,
    acc: Accumulator,
    theta: Decimal,
    tick_rule: TickRule,
    ewma: Ewma,
}

impl ImbalanceBarBuilder {
    pub fn new(
        bar_type: String,
        unit: Unit,
        window: u32,
        source: impl Into<String>,
        pair: impl Into<String>,
        prior: Option<&Bar>,
    ) -> Self {
        let (ewma, prior_sign) = seed_from_prior(window, prior);
        let mut tick_rule = TickRule::new();
        if let Some(sign) = prior_sign {
            tick_rule.carry(sign);
        }
        Self {
            bar_type,
            source: source.into(),
            pair: pair.into(),
            unit,
            acc: Accumulator::new(),
            theta: Decimal::ZERO,
            tick_rule,
            ewma,
        }
    }
}

impl BarBuilder for ImbalanceBarBuilder {
    fn bar_type(&self) -> &str {
        &self.bar_type
    }

    fn process_trade(&mut self, trade: &Trade) -> Option<Bar> {
        let sign = self.tick_rule.resolve(trade.side, trade.price);
        self.theta += Decimal::from(sign.value()) * self.unit.measure(trade);
        self.acc.add(trade);

        if self.theta.abs() >= self.ewma.expected {
            self.ewma.update(self.theta.abs());
            let metadata = self.ewma.metadata(sign as i8);
            let bar = self
                .acc
                .emit_bar(self.bar_type.clone(), self.source.clone(), self.pair.clone(), Some(metadata));
            self.acc.reset();
            self.theta = Decimal::ZERO;
            Some(bar)
        } else {
            None
        }
    }

    fn flush(&mut self) -> Option<Bar> {
        if self.acc.is_empty() {
            return None;
        }
        // A forced partial emission must not feed the EWMA series: it did
        // not realize a full threshold crossing.
        let metadata = self.ewma.metadata(self.tick_rule.last_sign() as i8);
        let bar = self
            .acc
            .emit_bar(self.bar_type.clone(), self.source.clone(), self.pair.clone(), Some(metadata));
        self.acc.reset();
        self.theta = Decimal::ZERO;
        Some(bar)
    }
}

/// `trb`/`vrb`/`drb`: tracks the current-run sign and magnitude, and the
/// maximum run seen so far in the bar; emits when `R >= E_R`.
pub struct RunBarBuilder {
    bar_type: String,
    source: String,
    pair: String,
    unit: Unit,
    acc: Accumulator,
    run_sign: Option<Sign>,
    run_magnitude: Decimal,
    max_run: Decimal,
    tick_rule: TickRule,
    ewma: Ewma,
}

impl RunBarBuilder {
    pub fn new(
        bar_type: String,
        unit: Unit,
        window: u32,
        source: impl Into<String>,
        pair: impl Into<String>,
        prior: Option<&Bar>,
    ) -> Self {
        let (ewma, prior_sign) = seed_from_prior(window, prior);
        let mut tick_rule = TickRule::new();
        if let Some(sign) = prior_sign {
            tick_rule.carry(sign);
        }
        Self {
            bar_type,
            source: source.into(),
            pair: pair.into(),
            unit,
            acc: Accumulator::new(),
            run_sign: None,
            run_magnitude: Decimal::ZERO,
            max_run: Decimal::ZERO,
            tick_rule,
            ewma,
        }
    }
}

impl BarBuilder for RunBarBuilder {
    fn bar_type(&self) -> &str {
        &self.bar_type
    }

    fn process_trade(&mut self, trade: &Trade) -> Option<Bar> {
        let sign = self.tick_rule.resolve(trade.side, trade.price);
        let unit_value = self.unit.measure(trade);

        match self.run_sign {
            Some(s) if s == sign => self.run_magnitude += unit_value,
            _ => {
                self.run_sign = Some(sign);
                self.run_magnitude = unit_value;
            }
        }
        if self.run_magnitude > self.max_run {
            self.max_run = self.run_magnitude;
        }
        self.acc.add(trade);

        if self.max_run >= self.ewma.expected {
            self.ewma.update(self.max_run);
            let metadata = self.ewma.metadata(sign as i8);
            let bar = self
                .acc
                .emit_bar(self.bar_type.clone(), self.source.clone(), self.pair.clone(), Some(metadata));
            self.acc.reset();
            self.run_sign = None;
            self.run_magnitude = Decimal::ZERO;
            self.max_run = Decimal::ZERO;
            Some(bar)
        } else {
            None
        }
    }

    fn flush(&mut self) -> Option<Bar> {
        if self.acc.is_empty() {
            return None;
        }
        let metadata = self.ewma.metadata(self.tick_rule.last_sign() as i8);
        let bar = self
            .acc
            .emit_bar(self.bar_type.clone(), self.source.clone(), self.pair.clone(), Some(metadata));
        self.acc.reset();
        self.run_sign = None;
        self.run_magnitude = Decimal::ZERO;
        self.max_run = Decimal::ZERO;
        Some(bar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::side::Side;
    use rust_decimal_macros::dec;

    fn buy_at(size: Decimal, ts_secs: i64) -> Trade {
        Trade {
            timestamp: chrono::DateTime::from_timestamp(ts_secs, 0).unwrap(),
            trade_id: ts_secs.to_string(),
            source: "coinbase".to_string(),
            pair: "ETH-USD".to_string(),
            price: dec!(100),
            size,
            side: Side::Buy,
        }
    }

    #[test]
    fn tib_bootstrap_then_one_trade_per_bar() {
        // All buys, uniform size 1: theta grows 1,2,3,4. Bootstrap emits at
        // the first trade (theta=1 > 0); thereafter the EWMA window=2
        // converges to one-trade bars since each realized |theta| seeds an
        // expectation of 1, matching the very next single-trade imbalance.
        let mut b = ImbalanceBarBuilder::new("tib_2".to_string(), Unit::Tick, 2, "coinbase", "ETH-USD", None);
        let bar1 = b.process_trade(&buy_at(dec!(1), 0)).expect("cold start emits immediately");
        assert_eq!(bar1.tick_count, 1);
        let meta1 = bar1.metadata.unwrap();
        assert_eq!(meta1.ewma_expected, dec!(1));
        assert_eq!(meta1.ewma_bar_count, 1);

        let bar2 = b.process_trade(&buy_at(dec!(1), 1)).expect("second bar emits after one trade");
        assert_eq!(bar2.tick_count, 1);
    }

    #[test]
    fn run_bar_accumulates_same_sign_magnitude() {
        let mut b = RunBarBuilder::new("trb_5".to_string(), Unit::Tick, 5, "coinbase", "ETH-USD", None);
        // First buy: run magnitude 1, bootstrap fires immediately (R=1 >= E=0).
        let bar1 = b.process_trade(&buy_at(dec!(1), 0)).unwrap();
        assert_eq!(bar1.tick_count, 1);
        let e1 = bar1.metadata.unwrap().ewma_expected;
        assert_eq!(e1, dec!(1));
    }

    #[test]
    fn resumes_ewma_state_from_prior_bar() {
        let prior = Bar {
            time_start: chrono::DateTime::from_timestamp(0, 0).unwrap(),
            time_end: chrono::DateTime::from_timestamp(1, 0).unwrap(),
            bar_type: "tib_2".to_string(),
            source: "coinbase".to_string(),
            pair: "ETH-USD".to_string(),
            open: dec!(100),
            high: dec!(100),
            low: dec!(100),
            close: dec!(100),
            vwap: dec!(100),
            volume: dec!(1),
            dollar_volume: dec!(100),
            tick_count: 1,
            metadata: Some(BarMetadata {
                ewma_expected: dec!(3),
                ewma_window: 2,
                ewma_bar_count: 5,
                last_trade_sign: 1,
            }),
        };
        let mut b = ImbalanceBarBuilder::new("tib_2".to_string(), Unit::Tick, 2, "coinbase", "ETH-USD", Some(&prior));
        // theta must reach 3 before emitting, not 0.
        assert!(b.process_trade(&buy_at(dec!(1), 0)).is_none());
        assert!(b.process_trade(&buy_at(dec!(1), 1)).is_none());
        let bar = b.process_trade(&buy_at(dec!(1), 2)).unwrap();
        assert_eq!(bar.tick_count, 3);
    }
}
