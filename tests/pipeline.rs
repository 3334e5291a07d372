//! End-to-end exercise of ingestion followed by bar construction, against
//! in-memory `TradeSource`/`Store` fakes rather than a live exchange or
//! database.

use std::sync::{Arc, Mutex};

use arcana::bars::{build_builder, parse_bar_spec, BarBuilder};
use arcana::core::side::Side;
use arcana::core::{Bar, Trade};
use arcana::ingest::{Cancel, Ingester};
use arcana::source::{SourceError, TradeSource};
use arcana::store::{DayCount, Store, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

struct ScriptedSource {
    trades: Vec<Trade>,
    pairs: Vec<String>,
}

#[async_trait]
impl TradeSource for ScriptedSource {
    async fn fetch_window(
        &self,
        _pair: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Trade>, SourceError> {
        Ok(self
            .trades
            .iter()
            .filter(|t| t.timestamp >= start && t.timestamp < end)
            .cloned()
            .collect())
    }

    fn supported_pairs(&self) -> &[String] {
        &self.pairs
    }
}

#[derive(Default)]
struct MemoryStore {
    trades: Mutex<Vec<Trade>>,
    bars: Mutex<Vec<Bar>>,
}

#[async_trait]
impl Store for MemoryStore {
    async fn init_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_trades(&self, trades: &[Trade]) -> Result<(), StoreError> {
        let mut guard = self.trades.lock().unwrap();
        for t in trades {
            if !guard.iter().any(|e| e.source == t.source && e.trade_id == t.trade_id) {
                guard.push(t.clone());
            }
        }
        Ok(())
    }

    async fn insert_bars(&self, bars: &[Bar]) -> Result<(), StoreError> {
        let mut guard = self.bars.lock().unwrap();
        for bar in bars {
            guard.retain(|b| !(b.bar_type == bar.bar_type && b.time_start == bar.time_start));
            guard.push(bar.clone());
        }
        Ok(())
    }

    async fn max_trade_ts(&self, _source: &str, _pair: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.trades.lock().unwrap().iter().map(|t| t.timestamp).max())
    }

    async fn trades_since(
        &self,
        _source: &str,
        _pair: &str,
        ts: DateTime<Utc>,
    ) -> Result<Vec<Trade>, StoreError> {
        let mut trades: Vec<Trade> = self
            .trades
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.timestamp >= ts)
            .cloned()
            .collect();
        trades.sort_by_key(|t| t.timestamp);
        Ok(trades)
    }

    async fn last_bar(&self, bar_type: &str, _source: &str, _pair: &str) -> Result<Option<Bar>, StoreError> {
        Ok(self
            .bars
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.bar_type == bar_type)
            .max_by_key(|b| b.time_start)
            .cloned())
    }

    async fn count_by_day(
        &self,
        _source: &str,
        _pair: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<DayCount>, StoreError> {
        Ok(Vec::new())
    }
}

fn trade(id: u64, secs: i64, price: Decimal, size: Decimal) -> Trade {
    Trade {
        timestamp: DateTime::from_timestamp(secs, 0).unwrap(),
        trade_id: id.to_string(),
        source: "coinbase".to_string(),
        pair: "ETH-USD".to_string(),
        price,
        size,
        side: Side::Buy,
    }
}

#[tokio::test]
async fn ingest_then_build_tick_bars_end_to_end() {
    let trades: Vec<Trade> = (0..10)
        .map(|i| trade(i, i as i64, dec!(100) + Decimal::from(i), dec!(1)))
        .collect();
    let source = Arc::new(ScriptedSource {
        trades: trades.clone(),
        pairs: vec!["ETH-USD".to_string()],
    });
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::default());

    let ingester = Ingester::new(source, store.clone(), "coinbase", 100, 5);
    let cancel = Cancel::new();
    let since = DateTime::from_timestamp(0, 0).unwrap();
    let until = DateTime::from_timestamp(10, 0).unwrap();
    ingester.ingest("ETH-USD", since, until, &cancel).await.unwrap();

    let stored = store.trades_since("coinbase", "ETH-USD", since).await.unwrap();
    assert_eq!(stored.len(), 10);

    let spec = parse_bar_spec("tick_3").unwrap();
    let mut builder = build_builder(&spec, "coinbase", "ETH-USD", None);
    let bars = builder.process_trades(&stored);

    assert_eq!(bars.len(), 3);
    assert!(bars.iter().all(|b| b.tick_count == 3));
    assert_eq!(bars[0].open, dec!(100));

    store.insert_bars(&bars).await.unwrap();
    let last = store.last_bar("tick_3", "coinbase", "ETH-USD").await.unwrap();
    assert_eq!(last.unwrap().time_start, bars.last().unwrap().time_start);
}

#[tokio::test]
async fn bar_building_resumes_across_two_ingestion_runs() {
    let first_half: Vec<Trade> = (0..5).map(|i| trade(i, i as i64, dec!(10), dec!(1))).collect();
    let second_half: Vec<Trade> = (5..10).map(|i| trade(i, i as i64, dec!(10), dec!(1))).collect();
    let mut all = first_half.clone();
    all.extend(second_half.clone());

    let source = Arc::new(ScriptedSource {
        trades: all,
        pairs: vec!["ETH-USD".to_string()],
    });
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::default());
    let ingester = Ingester::new(source, store.clone(), "coinbase", 100, 10);
    let cancel = Cancel::new();

    ingester
        .ingest(
            "ETH-USD",
            DateTime::from_timestamp(0, 0).unwrap(),
            DateTime::from_timestamp(5, 0).unwrap(),
            &cancel,
        )
        .await
        .unwrap();

    let spec = parse_bar_spec("tick_5").unwrap();
    let first_batch = store.trades_since("coinbase", "ETH-USD", DateTime::from_timestamp(0, 0).unwrap()).await.unwrap();
    let mut builder = build_builder(&spec, "coinbase", "ETH-USD", None);
    let first_bars = builder.process_trades(&first_batch);
    assert_eq!(first_bars.len(), 1);
    store.insert_bars(&first_bars).await.unwrap();

    ingester
        .ingest(
            "ETH-USD",
            DateTime::from_timestamp(0, 0).unwrap(),
            DateTime::from_timestamp(10, 0).unwrap(),
            &cancel,
        )
        .await
        .unwrap();

    let last_bar = store.last_bar("tick_5", "coinbase", "ETH-USD").await.unwrap().unwrap();
    let resumed = store
        .trades_since(
            "coinbase",
            "ETH-USD",
            arcana::source::exchange::min_timestamp_increment(last_bar.time_end),
        )
        .await
        .unwrap();
    assert_eq!(resumed.len(), 5);

    let mut resumed_builder = build_builder(&spec, "coinbase", "ETH-USD", Some(&last_bar));
    let second_bars = resumed_builder.process_trades(&resumed);
    assert_eq!(second_bars.len(), 1);
}

#[tokio::test]
async fn swarm_validate_reports_days_with_no_trades() {
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::default());
    let since = DateTime::from_timestamp(0, 0).unwrap();
    let until = since + chrono::Duration::days(2);
    let gaps = arcana::swarm::validate(store.as_ref(), "coinbase", "ETH-USD", since, until)
        .await
        .unwrap();
    assert_eq!(gaps.len(), 2);
    assert_eq!(gaps[0].day, NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
}
