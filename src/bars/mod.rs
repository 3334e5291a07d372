//! Bar construction: ten families sharing one accumulator, each with its own
//! emission predicate and optional EWMA threshold state.
//!
//! Bar builders are polymorphic over a single capability set
//! (`process_trade`, `process_trades`, `flush`, `bar_type`) dispatched via a
//! trait object rather than an inheritance hierarchy — adding a new family
//! is a single new variant with its own predicate.

pub mod adaptive;
pub mod spec;
pub mod standard;

use crate::core::{Bar, Trade};

/// Shared protocol implemented by all ten bar families.
pub trait BarBuilder: Send {
    /// Table-naming identifier, e.g. `tick_500`, `tib_10`.
    fn bar_type(&self) -> &str;

    /// Fold a trade into the accumulator; if the emission predicate fires,
    /// emit and reset. The triggering trade is the last trade of the
    /// emitted bar (inclusive).
    fn process_trade(&mut self, trade: &Trade) -> Option<Bar>;

    /// Fold a sequence of trades, collecting every emission in order.
    fn process_trades(&mut self, trades: &[Trade]) -> Vec<Bar> {
        trades.iter().filter_map(|t| self.process_trade(t)).collect()
    }

    /// Force emission of a partial in-progress bar. Only call at
    /// end-of-data or graceful shutdown — never between batches of the same
    /// logical stream, since a premature flush yields a below-threshold bar
    /// and corrupts the EWMA series for adaptive families.
    fn flush(&mut self) -> Option<Bar>;
}

pub use spec::{parse_bar_spec, BarSpec};

use adaptive::{ImbalanceBarBuilder, RunBarBuilder, Unit};
use standard::StandardBarBuilder;

/// Construct the concrete builder for a parsed spec, seeding adaptive
/// families' EWMA state from `prior` (the family's most recently stored
/// bar, via `Store::last_bar`) when resuming.
pub fn build_builder(
    spec: &BarSpec,
    source: impl Into<String>,
    pair: impl Into<String>,
    prior: Option<&Bar>,
) -> Box<dyn BarBuilder> {
    let source = source.into();
    let pair = pair.into();
    match *spec {
        BarSpec::Tick { n } => Box::new(StandardBarBuilder::tick(n, source, pair)),
        BarSpec::Volume { v } => Box::new(StandardBarBuilder::volume(v, source, pair)),
        BarSpec::Dollar { d } => Box::new(StandardBarBuilder::dollar(d, source, pair)),
        BarSpec::Time { period_secs } => {
            Box::new(StandardBarBuilder::time(spec.bar_type(), period_secs, source, pair))
        }
        BarSpec::Tib { window } => Box::new(ImbalanceBarBuilder::new(
            spec.bar_type(),
            Unit::Tick,
            window,
            source,
            pair,
            prior,
        )),
        BarSpec::Vib { window } => Box::new(ImbalanceBarBuilder::new(
            spec.bar_type(),
            Unit::Volume,
            window,
            source,
            pair,
            prior,
        )),
        BarSpec::Dib { window } => Box::new(ImbalanceBarBuilder::new(
            spec.bar_type(),
            Unit::Dollar,
            window,
            source,
            pair,
            prior,
        )),
        BarSpec::Trb { window } => {
            Box::new(RunBarBuilder::new(spec.bar_type(), Unit::Tick, window, source, pair, prior))
        }
        BarSpec::Vrb { window } => {
            Box::new(RunBarBuilder::new(spec.bar_type(), Unit::Volume, window, source, pair, prior))
        }
        BarSpec::Drb { window } => {
            Box::new(RunBarBuilder::new(spec.bar_type(), Unit::Dollar, window, source, pair, prior))
        }
    }
}
