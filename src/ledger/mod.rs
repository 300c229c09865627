//! Snapshot Ledger
//!
//! Append-only (WORM) record of every market snapshot, fill outcome and
//! pre-trade proof. Entries are never updated or deleted; a newer snapshot
//! supersedes an older one by receipt time.

pub mod feed;
pub mod memory;
pub mod sqlite;

pub use feed::{LedgerFeed, MarketDataFeed};
pub use memory::MemoryLedger;
pub use sqlite::SqliteLedger;

use crate::audit::{AuditStamp, Millis};
use crate::models::{
    AssetClass, MarketSnapshot, OptionChain, OrderBook, Quote, SnapshotKind, StructureKind,
};
use crate::proof::ProofKind;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Executed-fill outcome as seen by the post-trade gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillRecord {
    pub trade_id: String,
    pub symbol: String,
    pub asset_class: AssetClass,
    pub fill_price: f64,
    pub quantity: f64,
    pub fees: f64,
    /// Notional premium paid (price x quantity x multiplier).
    pub premium: f64,
    /// (fees + slippage cost) / premium.
    pub friction_pct: f64,
    pub slippage_pct: f64,
    pub planned_max_slippage_pct: f64,
    pub passed: bool,
    #[serde(default)]
    pub failed_kinds: Vec<ProofKind>,
}

/// Pre-trade proof outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofRecord {
    pub symbol: String,
    pub structure: StructureKind,
    pub contracts: u32,
    pub total_cost: f64,
    /// Options usage after this trade, as a fraction of pool equity.
    pub options_used_pct: f64,
    pub options_cap_pct: f64,
    pub passed: bool,
    #[serde(default)]
    pub failed_kinds: Vec<ProofKind>,
    #[serde(default)]
    pub reasons: Vec<String>,
}

/// Anything the ledger can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum LedgerPayload {
    Quote(Quote),
    Chain(OptionChain),
    OrderBook(OrderBook),
    Fill(FillRecord),
    Proof(ProofRecord),
}

impl LedgerPayload {
    pub fn kind(&self) -> SnapshotKind {
        match self {
            Self::Quote(_) => SnapshotKind::Quote,
            Self::Chain(_) => SnapshotKind::Chain,
            Self::OrderBook(_) => SnapshotKind::OrderBook,
            Self::Fill(_) => SnapshotKind::Fill,
            Self::Proof(_) => SnapshotKind::Proof,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Self::Quote(q) => &q.symbol,
            Self::Chain(c) => &c.symbol,
            Self::OrderBook(b) => &b.symbol,
            Self::Fill(f) => &f.symbol,
            Self::Proof(p) => &p.symbol,
        }
    }
}

impl From<MarketSnapshot> for LedgerPayload {
    fn from(snapshot: MarketSnapshot) -> Self {
        match snapshot {
            MarketSnapshot::Quote(q) => Self::Quote(q),
            MarketSnapshot::Chain(c) => Self::Chain(c),
            MarketSnapshot::OrderBook(b) => Self::OrderBook(b),
        }
    }
}

/// One immutable ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub seq: u64,
    pub stamp: AuditStamp,
    pub payload: LedgerPayload,
}

impl LedgerEntry {
    pub fn kind(&self) -> SnapshotKind {
        self.payload.kind()
    }

    pub fn symbol(&self) -> &str {
        self.payload.symbol()
    }
}

/// Inclusive receipt-time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Millis,
    pub end: Millis,
}

impl TimeRange {
    pub fn new(start: Millis, end: Millis) -> Self {
        Self { start, end }
    }

    pub fn since(start: Millis) -> Self {
        Self {
            start,
            end: Millis::MAX,
        }
    }

    pub fn contains(&self, ts: Millis) -> bool {
        ts >= self.start && ts <= self.end
    }
}

/// Friction compliance over a set of fills.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrictionStats {
    pub fills: usize,
    pub within_soft: usize,
    pub within_hard: usize,
    /// Vacuously 1.0 with no fills.
    pub soft_pct: f64,
    pub hard_pct: f64,
    pub avg_friction: f64,
}

impl FrictionStats {
    pub fn from_entries(entries: &[LedgerEntry], soft_threshold: f64, hard_threshold: f64) -> Self {
        let frictions: Vec<f64> = entries
            .iter()
            .filter_map(|e| match &e.payload {
                LedgerPayload::Fill(f) => Some(f.friction_pct),
                _ => None,
            })
            .collect();

        let fills = frictions.len();
        let within_soft = frictions.iter().filter(|f| **f <= soft_threshold).count();
        let within_hard = frictions.iter().filter(|f| **f <= hard_threshold).count();

        if fills == 0 {
            return Self {
                fills,
                within_soft,
                within_hard,
                soft_pct: 1.0,
                hard_pct: 1.0,
                avg_friction: 0.0,
            };
        }

        Self {
            fills,
            within_soft,
            within_hard,
            soft_pct: within_soft as f64 / fills as f64,
            hard_pct: within_hard as f64 / fills as f64,
            avg_friction: frictions.iter().sum::<f64>() / fills as f64,
        }
    }
}

/// Append-only storage for snapshots and proof outcomes.
#[async_trait::async_trait]
pub trait SnapshotLedger: Send + Sync {
    /// Append a payload. Returns the assigned sequence number.
    async fn record(&self, payload: LedgerPayload, stamp: AuditStamp) -> Result<u64>;

    /// Entries whose receipt time falls in `range`, ordered by receipt time
    /// then sequence. `None` selects every symbol.
    async fn query(&self, symbol: Option<&str>, range: TimeRange) -> Result<Vec<LedgerEntry>>;

    /// Most recent entry of `kind` for `symbol` whose feed time is no older
    /// than `max_age_ms` at `now_ms`.
    async fn latest_fresh(
        &self,
        symbol: &str,
        kind: SnapshotKind,
        now_ms: Millis,
        max_age_ms: Millis,
    ) -> Result<Option<LedgerEntry>>;

    /// Friction compliance of every fill recorded since `window_start`.
    async fn friction_stats(
        &self,
        window_start: Millis,
        soft_threshold: f64,
        hard_threshold: f64,
    ) -> Result<FrictionStats> {
        let entries = self.query(None, TimeRange::since(window_start)).await?;
        Ok(FrictionStats::from_entries(
            &entries,
            soft_threshold,
            hard_threshold,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn stamp(ts: Millis) -> AuditStamp {
        AuditStamp {
            ts_feed: ts,
            ts_recv: ts,
            server_ts: ts,
            commit_hash: "test".into(),
            policy_hash: "0".repeat(64),
            environment: "test".into(),
        }
    }

    fn fill_entry(seq: u64, friction: f64) -> LedgerEntry {
        LedgerEntry {
            seq,
            stamp: stamp(seq as Millis),
            payload: LedgerPayload::Fill(FillRecord {
                trade_id: format!("t{}", seq),
                symbol: "SPY".into(),
                asset_class: AssetClass::Options,
                fill_price: 1.5,
                quantity: 1.0,
                fees: 1.3,
                premium: 150.0,
                friction_pct: friction,
                slippage_pct: 0.01,
                planned_max_slippage_pct: 0.02,
                passed: true,
                failed_kinds: vec![],
            }),
        }
    }

    #[test]
    fn test_friction_stats_vacuous() {
        let stats = FrictionStats::from_entries(&[], 0.20, 0.25);
        assert_eq!(stats.fills, 0);
        assert_eq!(stats.soft_pct, 1.0);
        assert_eq!(stats.hard_pct, 1.0);
    }

    #[test]
    fn test_friction_stats_counts() {
        let entries = vec![fill_entry(1, 0.05), fill_entry(2, 0.22), fill_entry(3, 0.30)];
        let stats = FrictionStats::from_entries(&entries, 0.20, 0.25);
        assert_eq!(stats.fills, 3);
        assert_eq!(stats.within_soft, 1);
        assert_eq!(stats.within_hard, 2);
        assert!((stats.hard_pct - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_payload_json_shape() {
        let json = serde_json::to_value(&fill_entry(1, 0.1).payload).unwrap();
        assert_eq!(json["kind"], "fill");
        assert_eq!(json["data"]["trade_id"], "t1");
    }
}
