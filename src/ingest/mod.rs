//! Ingester: resumable, paginated, checkpointed trade ingestion.
//!
//! Backfill and daemon modes share one inner loop. Within a single process
//! the loop is single-threaded and cooperative: network I/O, retries, and
//! database commits run serially, and the only concurrency is between the
//! main loop and a cancellation signal observed between windows and
//! batches (§5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::core::Trade;
use crate::error::ArcanaError;
use crate::source::exchange::min_timestamp_increment;
use crate::source::TradeSource;
use crate::store::Store;

/// Cooperative cancellation signal. Checked between windows and between
/// batch commits; a crash or cancellation loses at most one uncommitted
/// batch (`<= batch_size` trades), which the next run simply re-fetches.
#[derive(Clone, Default)]
pub struct Cancel(Arc<AtomicBool>);

impl Cancel {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Ingester {
    source: Arc<dyn TradeSource>,
    store: Arc<dyn Store>,
    source_tag: String,
    window: Duration,
    batch_size: usize,
}

impl Ingester {
    pub fn new(
        source: Arc<dyn TradeSource>,
        store: Arc<dyn Store>,
        source_tag: impl Into<String>,
        window_seconds: i64,
        batch_size: usize,
    ) -> Self {
        Self {
            source,
            store,
            source_tag: source_tag.into(),
            window: Duration::seconds(window_seconds),
            batch_size,
        }
    }

    /// Walk `[since, until)` in fixed-size windows, resuming from
    /// `max(since, max_trade_ts + epsilon)`.
    pub async fn ingest(
        &self,
        pair: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        cancel: &Cancel,
    ) -> Result<(), ArcanaError> {
        let resume_point = self.store.max_trade_ts(&self.source_tag, pair).await?;
        let mut cursor = match resume_point {
            Some(ts) => since.max(min_timestamp_increment(ts)),
            None => since,
        };

        while cursor < until {
            if cancel.is_cancelled() {
                info!(pair, %cursor, "cancellation observed between windows, stopping");
                return Ok(());
            }

            let window_end = (cursor + self.window).min(until);
            let trades = self.source.fetch_window(pair, cursor, window_end).await?;

            if trades.is_empty() {
                cursor = window_end;
                continue;
            }

            let total = trades.len();
            let mut ingested = 0usize;
            for batch in trades.chunks(self.batch_size) {
                self.store.insert_trades(batch).await?;
                ingested += batch.len();
                if cancel.is_cancelled() {
                    info!(pair, ingested, total, "cancellation observed mid-window after batch commit");
                    return Ok(());
                }
            }

            info!(
                pair,
                window_start = %cursor,
                window_end = %window_end,
                ingested,
                until = %until,
                "ingested window"
            );
            cursor = window_end;
        }

        Ok(())
    }

    /// Poll `[max_trade_ts, now)` every `interval`, closing the gap first.
    pub async fn run(
        &self,
        pair: &str,
        interval_seconds: i64,
        cancel: &Cancel,
    ) -> Result<(), ArcanaError> {
        let baseline = self.store.max_trade_ts(&self.source_tag, pair).await?;
        let Some(baseline) = baseline else {
            return Err(ArcanaError::Precondition(format!(
                "daemon requires a backfill-established baseline for {pair}, found none"
            )));
        };

        let mut since = baseline;
        loop {
            if cancel.is_cancelled() {
                info!(pair, "termination signal received, exiting daemon loop");
                return Ok(());
            }

            let now = Utc::now();
            self.ingest(pair, since, now, cancel).await?;
            since = now;

            if cancel.is_cancelled() {
                return Ok(());
            }

            tokio::select! {
                _ = tokio::time::sleep(std::time::Duration::from_secs(interval_seconds as u64)) => {}
                _ = wait_for_cancel(cancel) => {
                    info!(pair, "termination signal received during sleep, exiting daemon loop");
                    return Ok(());
                }
            }
        }
    }
}

async fn wait_for_cancel(cancel: &Cancel) {
    while !cancel.is_cancelled() {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}
