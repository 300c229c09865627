//! Market data access used by the engine.

use super::{LedgerPayload, SnapshotLedger, TimeRange};
use crate::audit::{Millis, TimeSource};
use crate::models::{OptionChain, OrderBook, Quote, SnapshotKind};
use anyhow::Result;
use std::sync::Arc;

/// Point-in-time market data lookups.
#[async_trait::async_trait]
pub trait MarketDataFeed: Send + Sync {
    /// Latest quote no older than `max_age_ms`.
    async fn get_latest_quote(&self, symbol: &str, max_age_ms: Millis) -> Result<Option<Quote>>;

    /// Latest fresh option chain.
    async fn get_chain(&self, symbol: &str) -> Result<Option<OptionChain>>;

    /// Book whose feed time is closest to `ts`, within `max_age_ms` either side.
    async fn get_order_book_at_time(
        &self,
        symbol: &str,
        ts: Millis,
        max_age_ms: Millis,
    ) -> Result<Option<OrderBook>>;
}

/// Feed that reads back whatever has been recorded in a ledger.
pub struct LedgerFeed {
    ledger: Arc<dyn SnapshotLedger>,
    time: Arc<dyn TimeSource>,
    chain_max_age_ms: Millis,
}

impl LedgerFeed {
    pub fn new(
        ledger: Arc<dyn SnapshotLedger>,
        time: Arc<dyn TimeSource>,
        chain_max_age_ms: Millis,
    ) -> Self {
        Self {
            ledger,
            time,
            chain_max_age_ms,
        }
    }
}

#[async_trait::async_trait]
impl MarketDataFeed for LedgerFeed {
    async fn get_latest_quote(&self, symbol: &str, max_age_ms: Millis) -> Result<Option<Quote>> {
        let now = self.time.now_ms();
        let entry = self
            .ledger
            .latest_fresh(symbol, SnapshotKind::Quote, now, max_age_ms)
            .await?;
        Ok(entry.and_then(|e| match e.payload {
            LedgerPayload::Quote(q) => Some(q),
            _ => None,
        }))
    }

    async fn get_chain(&self, symbol: &str) -> Result<Option<OptionChain>> {
        let now = self.time.now_ms();
        let entry = self
            .ledger
            .latest_fresh(symbol, SnapshotKind::Chain, now, self.chain_max_age_ms)
            .await?;
        Ok(entry.and_then(|e| match e.payload {
            LedgerPayload::Chain(c) => Some(c),
            _ => None,
        }))
    }

    async fn get_order_book_at_time(
        &self,
        symbol: &str,
        ts: Millis,
        max_age_ms: Millis,
    ) -> Result<Option<OrderBook>> {
        let range = TimeRange::new(ts.saturating_sub(max_age_ms), ts.saturating_add(max_age_ms));
        let entries = self.ledger.query(Some(symbol), range).await?;

        Ok(entries
            .into_iter()
            .filter_map(|e| match e.payload {
                LedgerPayload::OrderBook(b) => Some(b),
                _ => None,
            })
            .filter(|b| (b.ts_feed - ts).abs() <= max_age_ms)
            .min_by_key(|b| (b.ts_feed - ts).abs()))
    }
}
