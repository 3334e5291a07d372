//! Swarm planner: partitions a long historical range into disjoint
//! sub-ranges for horizontally scaled-out ingestion, and validates the
//! resulting trade log for gaps.
//!
//! Coordination across the resulting worker processes is delegated
//! entirely to the store's `(source, trade_id, timestamp)` uniqueness
//! constraint and per-`(bar_type, pair)` physical partitioning (§4.7, §5) —
//! this module itself holds no synchronization primitives.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::error::ArcanaError;
use crate::store::Store;

/// One worker's assigned sub-range, destined for `arcana ingest --since
/// --until`. Generating the concrete process/container manifest (docker
/// compose, k8s Job, systemd unit) is an external collaborator's concern;
/// this is the data that collaborator consumes.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WorkerRange {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

/// Partitions `[since, until]` into `n` contiguous, disjoint sub-ranges of
/// equal duration. The last range absorbs any remainder so the partition
/// exactly covers the input range.
pub fn partition(since: DateTime<Utc>, until: DateTime<Utc>, n: usize) -> Result<Vec<WorkerRange>, ArcanaError> {
    if n == 0 {
        return Err(ArcanaError::Input("swarm partition count must be >= 1".to_string()));
    }
    if until <= since {
        return Err(ArcanaError::Input(format!(
            "swarm range [{since}, {until}] is empty or inverted"
        )));
    }

    let total = until - since;
    let chunk = total / (n as i32);
    let mut ranges = Vec::with_capacity(n);
    let mut cursor = since;
    for i in 0..n {
        let end = if i + 1 == n { until } else { cursor + chunk };
        ranges.push(WorkerRange { since: cursor, until: end });
        cursor = end;
    }
    Ok(ranges)
}

/// A UTC day inside the requested range with zero ingested trades.
#[derive(Debug, Clone, PartialEq)]
pub struct Gap {
    pub day: NaiveDate,
}

/// Reports UTC days in `[since, until)` with no ingested trades — the
/// user-visible gap report.
pub async fn validate(
    store: &dyn Store,
    source: &str,
    pair: &str,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<Vec<Gap>, ArcanaError> {
    let counts = store.count_by_day(source, pair, since, until).await?;
    let present: std::collections::HashSet<NaiveDate> = counts
        .iter()
        .filter(|c| c.count > 0)
        .map(|c| c.day)
        .collect();

    let mut gaps = Vec::new();
    let mut day = since.date_naive();
    let last_day = (until - Duration::nanoseconds(1)).date_naive();
    while day <= last_day {
        if !present.contains(&day) {
            gaps.push(Gap { day });
        }
        day = day.succ_opt().expect("day increment does not overflow within any realistic range");
    }
    Ok(gaps)
}
