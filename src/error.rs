//! Top-level error type and exit-code mapping.
//!
//! Mirrors the five error kinds of the error-handling design: transient I/O
//! (retried locally, surfaces only after exhaustion), protocol violations,
//! integrity violations (logged, non-halting), input errors, and
//! preconditions. Only the first is ever retried; the rest propagate to the
//! command surface.

use thiserror::Error;

/// Crate-wide error type returned by the core pipeline.
#[derive(Error, Debug)]
pub enum ArcanaError {
    /// Retry-exhausted network or database failure.
    #[error("transient I/O failure: {0}")]
    Transient(String),

    /// Unparseable response or unexpected schema from an external system.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Divergent duplicate (logged, not fatal by itself, but surfaced to
    /// callers that want to fail loudly in tests).
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// Bad spec, bad date range, unknown pair: rejected before any I/O.
    #[error("invalid input: {0}")]
    Input(String),

    /// A precondition for the requested operation does not hold (e.g. the
    /// daemon has no baseline trade to resume from).
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error(transparent)]
    Source(#[from] crate::source::SourceError),

    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
}

impl ArcanaError {
    /// Process exit code per the documented convention: 0 success, 1
    /// operational failure, 2 bad input.
    pub fn exit_code(&self) -> i32 {
        match self {
            ArcanaError::Input(_) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, ArcanaError>;
