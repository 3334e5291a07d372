//! `Store` implementation backed by a PostgreSQL/TimescaleDB-style
//! time-partitioned schema.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, error};

use crate::core::bar::{Bar, BarMetadata};
use crate::core::side::Side;
use crate::core::Trade;

use super::{DayCount, Store, StoreError};

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::Transient(e.to_string())
            }
            _ => StoreError::Integrity(e.to_string()),
        }
    }
}

/// Store backed by a `sqlx::PgPool`.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lazily create the bar table for `(bar_type, pair)` if it does not
    /// already exist. `bar_type` is produced by the validated bar-spec
    /// grammar and `pair_slug` strips everything but `[a-z0-9_]`, so the
    /// interpolated identifier is safe.
    async fn ensure_bar_table(&self, bar_type: &str, pair: &str) -> Result<String, StoreError> {
        let table = format!("bars_{}_{}", bar_type, Bar::pair_slug(pair));
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{table}" (
                time_start TIMESTAMPTZ NOT NULL,
                time_end TIMESTAMPTZ NOT NULL,
                bar_type TEXT NOT NULL,
                source TEXT NOT NULL,
                pair TEXT NOT NULL,
                open NUMERIC NOT NULL,
                high NUMERIC NOT NULL,
                low NUMERIC NOT NULL,
                close NUMERIC NOT NULL,
                vwap NUMERIC NOT NULL,
                volume NUMERIC NOT NULL,
                dollar_volume NUMERIC NOT NULL,
                tick_count BIGINT NOT NULL,
                metadata JSONB,
                PRIMARY KEY (bar_type, source, pair, time_start)
            )
            "#
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        Ok(table)
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS raw_trades (
                "timestamp" TIMESTAMPTZ NOT NULL,
                trade_id TEXT NOT NULL,
                source TEXT NOT NULL,
                pair TEXT NOT NULL,
                price NUMERIC NOT NULL,
                size NUMERIC NOT NULL,
                side TEXT NOT NULL,
                PRIMARY KEY (source, trade_id, "timestamp")
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_trades(&self, trades: &[Trade]) -> Result<(), StoreError> {
        for batch in trades.chunks(1000) {
            let mut tx = self.pool.begin().await?;
            for trade in batch {
                let side = match trade.side {
                    Side::Buy => "buy",
                    Side::Sell => "sell",
                    Side::Unknown => "unknown",
                };
                sqlx::query(
                    r#"
                    INSERT INTO raw_trades ("timestamp", trade_id, source, pair, price, size, side)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    ON CONFLICT (source, trade_id, "timestamp") DO NOTHING
                    "#,
                )
                .bind(trade.timestamp)
                .bind(&trade.trade_id)
                .bind(&trade.source)
                .bind(&trade.pair)
                .bind(trade.price)
                .bind(trade.size)
                .bind(side)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            debug!(count = batch.len(), "committed trade batch");
        }
        Ok(())
    }

    async fn insert_bars(&self, bars: &[Bar]) -> Result<(), StoreError> {
        for bar in bars {
            let table = self.ensure_bar_table(&bar.bar_type, &bar.pair).await?;
            let metadata_json = bar
                .metadata
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(|e| StoreError::Integrity(format!("metadata serialization: {e}")))?;

            let query = format!(
                r#"
                INSERT INTO "{table}"
                    (time_start, time_end, bar_type, source, pair, open, high, low, close, vwap,
                     volume, dollar_volume, tick_count, metadata)
                VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)
                ON CONFLICT (bar_type, source, pair, time_start)
                DO UPDATE SET
                    time_end = EXCLUDED.time_end,
                    open = EXCLUDED.open,
                    high = EXCLUDED.high,
                    low = EXCLUDED.low,
                    close = EXCLUDED.close,
                    vwap = EXCLUDED.vwap,
                    volume = EXCLUDED.volume,
                    dollar_volume = EXCLUDED.dollar_volume,
                    tick_count = EXCLUDED.tick_count,
                    metadata = EXCLUDED.metadata
                "#
            );
            sqlx::query(&query)
                .bind(bar.time_start)
                .bind(bar.time_end)
                .bind(&bar.bar_type)
                .bind(&bar.source)
                .bind(&bar.pair)
                .bind(bar.open)
                .bind(bar.high)
                .bind(bar.low)
                .bind(bar.close)
                .bind(bar.vwap)
                .bind(bar.volume)
                .bind(bar.dollar_volume)
                .bind(bar.tick_count as i64)
                .bind(metadata_json)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn max_trade_ts(&self, source: &str, pair: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let row = sqlx::query(
            r#"SELECT MAX("timestamp") AS ts FROM raw_trades WHERE source = $1 AND pair = $2"#,
        )
        .bind(source)
        .bind(pair)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get::<Option<DateTime<Utc>>, _>("ts")?)
    }

    async fn trades_since(
        &self,
        source: &str,
        pair: &str,
        ts: DateTime<Utc>,
    ) -> Result<Vec<Trade>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT "timestamp", trade_id, source, pair, price, size, side
            FROM raw_trades
            WHERE source = $1 AND pair = $2 AND "timestamp" >= $3
            ORDER BY "timestamp" ASC
            "#,
        )
        .bind(source)
        .bind(pair)
        .bind(ts)
        .fetch_all(&self.pool)
        .await?;

        let mut trades = Vec::with_capacity(rows.len());
        for row in rows {
            let side_str: String = row.try_get("side")?;
            let side = match side_str.as_str() {
                "buy" => Side::Buy,
                "sell" => Side::Sell,
                _ => Side::Unknown,
            };
            trades.push(Trade {
                timestamp: row.try_get("timestamp")?,
                trade_id: row.try_get("trade_id")?,
                source: row.try_get("source")?,
                pair: row.try_get("pair")?,
                price: row.try_get::<Decimal, _>("price")?,
                size: row.try_get::<Decimal, _>("size")?,
                side,
            });
        }
        Ok(trades)
    }

    async fn last_bar(&self, bar_type: &str, source: &str, pair: &str) -> Result<Option<Bar>, StoreError> {
        let table = self.ensure_bar_table(bar_type, pair).await?;
        let query = format!(
            r#"
            SELECT time_start, time_end, bar_type, source, pair, open, high, low, close, vwap,
                   volume, dollar_volume, tick_count, metadata
            FROM "{table}"
            WHERE bar_type = $1 AND source = $2 AND pair = $3
            ORDER BY time_start DESC
            LIMIT 1
            "#
        );
        let row = sqlx::query(&query)
            .bind(bar_type)
            .bind(source)
            .bind(pair)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else { return Ok(None) };
        let metadata_json: Option<serde_json::Value> = row.try_get("metadata")?;
        let metadata = metadata_json
            .map(serde_json::from_value::<BarMetadata>)
            .transpose()
            .map_err(|e| {
                error!(%e, "divergent bar metadata, ignoring");
                StoreError::Integrity(format!("metadata deserialization: {e}"))
            })?;

        Ok(Some(Bar {
            time_start: row.try_get("time_start")?,
            time_end: row.try_get("time_end")?,
            bar_type: row.try_get("bar_type")?,
            source: row.try_get("source")?,
            pair: row.try_get("pair")?,
            open: row.try_get::<Decimal, _>("open")?,
            high: row.try_get::<Decimal, _>("high")?,
            low: row.try_get::<Decimal, _>("low")?,
            close: row.try_get::<Decimal, _>("close")?,
            vwap: row.try_get::<Decimal, _>("vwap")?,
            volume: row.try_get::<Decimal, _>("volume")?,
            dollar_volume: row.try_get::<Decimal, _>("dollar_volume")?,
            tick_count: row.try_get::<i64, _>("tick_count")? as u64,
            metadata,
        }))
    }

    async fn count_by_day(
        &self,
        source: &str,
        pair: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DayCount>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT date_trunc('day', "timestamp")::date AS day, COUNT(*) AS cnt
            FROM raw_trades
            WHERE source = $1 AND pair = $2 AND "timestamp" >= $3 AND "timestamp" < $4
            GROUP BY day
            ORDER BY day ASC
            "#,
        )
        .bind(source)
        .bind(pair)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(DayCount {
                day: row.try_get::<NaiveDate, _>("day")?,
                count: row.try_get::<i64, _>("cnt")?,
            });
        }
        Ok(out)
    }
}
