//! Store: the boundary between the pipeline and the time-partitioned
//! relational trade/bar log.

pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::core::{Bar, Trade};

#[derive(Error, Debug)]
pub enum StoreError {
    /// Connectivity failure; callers treat this as retryable by whole-batch
    /// replay (idempotent by construction).
    #[error("transient store failure: {0}")]
    Transient(String),

    /// Schema mismatch or a constraint violation on a non-unique field:
    /// fatal, halts the enclosing operation.
    #[error("store integrity failure: {0}")]
    Integrity(String),
}

/// Per-UTC-day trade count, used for gap detection.
#[derive(Debug, Clone, PartialEq)]
pub struct DayCount {
    pub day: NaiveDate,
    pub count: i64,
}

/// Trade log and bar storage.
#[async_trait]
pub trait Store: Send + Sync {
    /// Idempotent creation of the `raw_trades` table and its uniqueness
    /// constraint. Bar tables are created lazily on first `insert_bars`.
    async fn init_schema(&self) -> Result<(), StoreError>;

    /// Batched upsert, committing per batch of up to `batch_size`.
    /// Duplicates (same `(source, trade_id, timestamp)`) are silently
    /// ignored.
    async fn insert_trades(&self, trades: &[Trade]) -> Result<(), StoreError>;

    /// Upsert keyed by `(bar_type, source, pair, time_start)`; `metadata`
    /// overwrites the prior value on conflict so rebuilds refresh EWMA
    /// state.
    async fn insert_bars(&self, bars: &[Bar]) -> Result<(), StoreError>;

    /// Latest stored trade timestamp for `(source, pair)`, or `None` if no
    /// trade has ever been stored.
    async fn max_trade_ts(&self, source: &str, pair: &str) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Ascending trades with `timestamp >= ts`.
    async fn trades_since(
        &self,
        source: &str,
        pair: &str,
        ts: DateTime<Utc>,
    ) -> Result<Vec<Trade>, StoreError>;

    /// Most recent bar of `bar_type` for `(source, pair)`, or `None`.
    async fn last_bar(&self, bar_type: &str, source: &str, pair: &str) -> Result<Option<Bar>, StoreError>;

    /// Per-UTC-day trade counts over `[start, end)`, for gap detection.
    async fn count_by_day(
        &self,
        source: &str,
        pair: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DayCount>, StoreError>;
}
