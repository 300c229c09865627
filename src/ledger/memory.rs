//! In-memory ledger for tests, replays and the CLI's default mode.

use super::{LedgerEntry, LedgerPayload, SnapshotLedger, TimeRange};
use crate::audit::{AuditStamp, Millis};
use crate::models::SnapshotKind;
use anyhow::Result;
use parking_lot::RwLock;

#[derive(Debug, Default)]
pub struct MemoryLedger {
    entries: RwLock<Vec<LedgerEntry>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait::async_trait]
impl SnapshotLedger for MemoryLedger {
    async fn record(&self, payload: LedgerPayload, stamp: AuditStamp) -> Result<u64> {
        let mut entries = self.entries.write();
        let seq = entries.len() as u64 + 1;
        entries.push(LedgerEntry {
            seq,
            stamp,
            payload,
        });
        Ok(seq)
    }

    async fn query(&self, symbol: Option<&str>, range: TimeRange) -> Result<Vec<LedgerEntry>> {
        let entries = self.entries.read();
        let mut out: Vec<LedgerEntry> = entries
            .iter()
            .filter(|e| range.contains(e.stamp.ts_recv))
            .filter(|e| symbol.map_or(true, |s| e.symbol() == s))
            .cloned()
            .collect();
        out.sort_by_key(|e| (e.stamp.ts_recv, e.seq));
        Ok(out)
    }

    async fn latest_fresh(
        &self,
        symbol: &str,
        kind: SnapshotKind,
        now_ms: Millis,
        max_age_ms: Millis,
    ) -> Result<Option<LedgerEntry>> {
        let entries = self.entries.read();
        Ok(entries
            .iter()
            .filter(|e| e.kind() == kind && e.symbol() == symbol)
            .filter(|e| now_ms - e.stamp.ts_feed <= max_age_ms)
            .max_by_key(|e| (e.stamp.ts_recv, e.seq))
            .cloned())
    }
}
