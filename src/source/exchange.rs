//! HTTP-backed `TradeSource` implementing the backward-page-walk algorithm
//! against a public market-trades endpoint.

use std::collections::HashMap;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::side::Side;
use crate::core::Trade;

use super::{SourceError, TradeSource};

/// Max trades a single page request may return. The real upstream has an
/// undocumented ceiling (empirically 1000; 2500+ fails) — treat it as a
/// configurable constant, never assume server-side validation of an
/// excessive `limit`.
pub const DEFAULT_PAGE_LIMIT: usize = 1000;

/// Fixed backoff ladder for transient failures, per the retry design: 4
/// attempts at 2s, 4s, 8s, 16s before surfacing a fatal error.
const BACKOFF_LADDER_SECS: [u64; 4] = [2, 4, 8, 16];

#[derive(Debug, Deserialize)]
struct TradesResponse {
    trades: Vec<WireTrade>,
}

#[derive(Debug, Deserialize)]
struct WireTrade {
    trade_id: String,
    product_id: String,
    price: String,
    size: String,
    time: DateTime<Utc>,
    side: String,
}

impl WireTrade {
    fn into_trade(self, source: &str) -> Result<Trade, SourceError> {
        let price: Decimal = self.price.parse().map_err(|_| SourceError::Protocol {
            pair: self.product_id.clone(),
            message: format!("unparseable price '{}'", self.price),
        })?;
        let size: Decimal = self.size.parse().map_err(|_| SourceError::Protocol {
            pair: self.product_id.clone(),
            message: format!("unparseable size '{}'", self.size),
        })?;
        Ok(Trade {
            timestamp: self.time,
            trade_id: self.trade_id,
            source: source.to_string(),
            pair: self.product_id,
            price,
            size,
            side: Side::from_wire(&self.side),
        })
    }
}

/// Trade source backed by a public HTTP market-trades endpoint.
pub struct ExchangeTradeSource {
    client: Client,
    base_url: String,
    source_tag: String,
    pairs: Vec<String>,
    page_limit: usize,
    min_delay: StdDuration,
}

impl ExchangeTradeSource {
    pub fn new(base_url: impl Into<String>, source_tag: impl Into<String>, pairs: Vec<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            source_tag: source_tag.into(),
            pairs,
            page_limit: DEFAULT_PAGE_LIMIT,
            min_delay: StdDuration::from_millis(120),
        }
    }

    pub fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = page_limit;
        self
    }

    pub fn with_min_delay(mut self, min_delay: StdDuration) -> Self {
        self.min_delay = min_delay;
        self
    }

    /// Single page request with retry/backoff for transient failures.
    async fn fetch_page(
        &self,
        pair: &str,
        start: DateTime<Utc>,
        cursor: DateTime<Utc>,
    ) -> Result<Vec<WireTrade>, SourceError> {
        let mut attempt = 0usize;
        loop {
            let result = self.fetch_page_once(pair, start, cursor).await;
            match result {
                Ok(trades) => return Ok(trades),
                Err(SourceError::Transient { message, .. }) if attempt < BACKOFF_LADDER_SECS.len() => {
                    let delay = BACKOFF_LADDER_SECS[attempt];
                    warn!(pair, attempt, delay, %message, "retrying after transient fetch failure");
                    tokio::time::sleep(StdDuration::from_secs(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_page_once(
        &self,
        pair: &str,
        start: DateTime<Utc>,
        cursor: DateTime<Utc>,
    ) -> Result<Vec<WireTrade>, SourceError> {
        let params: HashMap<&str, String> = HashMap::from([
            ("product_id", pair.to_string()),
            ("start", start.timestamp().to_string()),
            ("end", cursor.timestamp().to_string()),
            ("limit", self.page_limit.to_string()),
        ]);

        let response = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| SourceError::Transient {
                pair: pair.to_string(),
                start,
                end: cursor,
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(SourceError::Transient {
                pair: pair.to_string(),
                start,
                end: cursor,
                message: format!("HTTP {status}"),
            });
        }
        if !status.is_success() {
            return Err(SourceError::Protocol {
                pair: pair.to_string(),
                message: format!("HTTP {status}"),
            });
        }

        let body: TradesResponse = response.json().await.map_err(|e| SourceError::Protocol {
            pair: pair.to_string(),
            message: format!("invalid response body: {e}"),
        })?;
        Ok(body.trades)
    }
}

#[async_trait]
impl TradeSource for ExchangeTradeSource {
    async fn fetch_window(
        &self,
        pair: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Trade>, SourceError> {
        let mut collected: Vec<WireTrade> = Vec::new();
        let mut cursor = end;

        loop {
            let page = self.fetch_page(pair, start, cursor).await?;
            let page_len = page.len();
            debug!(pair, %start, %cursor, page_len, "fetched page");

            if page_len < self.page_limit {
                collected.extend(page);
                break;
            }

            let earliest = page
                .iter()
                .map(|t| t.time)
                .min()
                .expect("full page is non-empty");
            collected.extend(page);

            if earliest >= cursor {
                return Err(SourceError::WindowTooBusy {
                    pair: pair.to_string(),
                    start,
                    end,
                    limit: self.page_limit,
                });
            }
            cursor = earliest;

            tokio::time::sleep(self.min_delay).await;
        }

        let mut seen = std::collections::HashSet::new();
        let mut trades = Vec::with_capacity(collected.len());
        for wire in collected {
            if seen.insert(wire.trade_id.clone()) {
                trades.push(wire.into_trade(&self.source_tag)?);
            }
        }
        trades.retain(|t| t.timestamp >= start && t.timestamp < end);
        trades.sort_by_key(|t| t.timestamp);
        Ok(trades)
    }

    fn supported_pairs(&self) -> &[String] {
        &self.pairs
    }
}

/// Smallest representable timestamp increment on the store: one
/// microsecond, matching chrono's sub-second precision.
pub fn min_timestamp_increment(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts + chrono::Duration::microseconds(1)
}

#[allow(dead_code)]
fn epoch(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).single().expect("valid timestamp")
}
