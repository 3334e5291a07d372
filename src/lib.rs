//! Resumable trade ingestion and information-driven bar construction for
//! cryptocurrency markets.
//!
//! This crate provides:
//!
//! - an exact-decimal trade and bar data model (no floats in the
//!   trade-to-bar path),
//! - a backward-page-walking, retrying, rate-limited `TradeSource`,
//! - a time-partitioned `Store` for the trade log and per-family bar
//!   tables,
//! - ten bar builder families (four fixed-threshold, six EWMA-adaptive
//!   information-driven) sharing one streaming accumulator,
//! - a resumable, checkpointed `Ingester` (backfill and daemon modes), and
//! - a swarm planner for partitioning a long historical backfill across
//!   concurrent, share-nothing worker processes.
//!
//! ## Basic usage
//!
//! ```
//! use arcana::bars::standard::StandardBarBuilder;
//! use arcana::bars::BarBuilder;
//!
//! let mut builder = StandardBarBuilder::tick(500, "coinbase", "ETH-USD");
//! assert_eq!(builder.bar_type(), "tick_500");
//! ```

pub mod bars;
pub mod config;
pub mod core;
pub mod error;
pub mod ingest;
pub mod source;
pub mod store;
pub mod swarm;

pub use config::Settings;
pub use core::{Accumulator, Bar, Trade};
pub use error::ArcanaError;
pub use ingest::Ingester;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::const_is_empty)]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(!NAME.is_empty());
    }
}
