//! Core trade and bar data model.
//!
//! This module contains the fundamental types shared by every other part of
//! the pipeline: the exact-decimal trade record, the mutable in-flight
//! accumulator, and the immutable emitted bar. No float arithmetic occurs
//! anywhere in this module.

pub mod accumulator;
pub mod bar;
pub mod side;
pub mod trade;

pub use accumulator::Accumulator;
pub use bar::{Bar, BarMetadata};
pub use side::Side;
pub use trade::Trade;
