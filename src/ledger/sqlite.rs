//! SQLite-backed snapshot ledger
//!
//! - WAL mode for concurrent reads during appends
//! - UPDATE / DELETE abort in triggers, so the table is write-once
//! - Payload stored as tagged JSON, stamp fields as columns for range scans

use super::{LedgerEntry, LedgerPayload, SnapshotLedger, TimeRange};
use crate::audit::{AuditStamp, Millis};
use crate::models::SnapshotKind;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, Row};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA temp_store = MEMORY;

CREATE TABLE IF NOT EXISTS ledger (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    kind TEXT NOT NULL,
    ts_feed INTEGER NOT NULL,
    ts_recv INTEGER NOT NULL,
    server_ts INTEGER NOT NULL,
    commit_hash TEXT NOT NULL,
    policy_hash TEXT NOT NULL,
    environment TEXT NOT NULL,
    payload_json TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_ledger_symbol_kind_recv
    ON ledger(symbol, kind, ts_recv);

CREATE INDEX IF NOT EXISTS idx_ledger_recv
    ON ledger(ts_recv);

CREATE TRIGGER IF NOT EXISTS ledger_no_update
    BEFORE UPDATE ON ledger
BEGIN
    SELECT RAISE(ABORT, 'ledger is append-only');
END;

CREATE TRIGGER IF NOT EXISTS ledger_no_delete
    BEFORE DELETE ON ledger
BEGIN
    SELECT RAISE(ABORT, 'ledger is append-only');
END;
"#;

const SELECT_COLUMNS: &str = "seq, ts_feed, ts_recv, server_ts, commit_hash, policy_hash, environment, payload_json";

/// Append-only ledger in a single SQLite file.
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    pub fn open(db_path: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(db_path, flags)
            .with_context(|| format!("Failed to open ledger at {}", db_path))?;
        Self::init(conn, db_path)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory ledger")?;
        Self::init(conn, ":memory:")
    }

    fn init(conn: Connection, label: &str) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize ledger schema")?;

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap_or_default();
        if journal_mode.to_lowercase() != "wal" && label != ":memory:" {
            warn!("WAL mode not active, journal_mode = {}", journal_mode);
        }

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM ledger", [], |row| row.get(0))
            .unwrap_or(0);
        info!(path = label, entries = count, "snapshot ledger opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM ledger", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}

/// Raw row; payload decoded after the statement is released.
struct RawEntry {
    seq: i64,
    stamp: AuditStamp,
    payload_json: String,
}

fn raw_from_row(row: &Row<'_>) -> rusqlite::Result<RawEntry> {
    Ok(RawEntry {
        seq: row.get(0)?,
        stamp: AuditStamp {
            ts_feed: row.get(1)?,
            ts_recv: row.get(2)?,
            server_ts: row.get(3)?,
            commit_hash: row.get(4)?,
            policy_hash: row.get(5)?,
            environment: row.get(6)?,
        },
        payload_json: row.get(7)?,
    })
}

fn decode(raw: RawEntry) -> Result<LedgerEntry> {
    let payload: LedgerPayload = serde_json::from_str(&raw.payload_json)
        .with_context(|| format!("Corrupt payload at ledger seq {}", raw.seq))?;
    Ok(LedgerEntry {
        seq: raw.seq as u64,
        stamp: raw.stamp,
        payload,
    })
}

#[async_trait::async_trait]
impl SnapshotLedger for SqliteLedger {
    async fn record(&self, payload: LedgerPayload, stamp: AuditStamp) -> Result<u64> {
        let payload_json = serde_json::to_string(&payload)?;
        let kind = payload.kind().as_str();
        let symbol = payload.symbol().to_string();

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO ledger
             (symbol, kind, ts_feed, ts_recv, server_ts, commit_hash, policy_hash, environment, payload_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                &symbol,
                kind,
                stamp.ts_feed,
                stamp.ts_recv,
                stamp.server_ts,
                &stamp.commit_hash,
                &stamp.policy_hash,
                &stamp.environment,
                &payload_json,
            ],
        )
        .context("Failed to append ledger entry")?;
        let seq = conn.last_insert_rowid() as u64;

        debug!(seq, symbol = %symbol, kind, "ledger append");
        Ok(seq)
    }

    async fn query(&self, symbol: Option<&str>, range: TimeRange) -> Result<Vec<LedgerEntry>> {
        let raws = {
            let conn = self.conn.lock();
            match symbol {
                Some(symbol) => {
                    let mut stmt = conn.prepare_cached(&format!(
                        "SELECT {} FROM ledger
                         WHERE symbol = ?1 AND ts_recv >= ?2 AND ts_recv <= ?3
                         ORDER BY ts_recv ASC, seq ASC",
                        SELECT_COLUMNS
                    ))?;
                    let rows = stmt
                        .query_map(params![symbol, range.start, range.end], raw_from_row)?
                        .collect::<Result<Vec<_>, _>>()?;
                    rows
                }
                None => {
                    let mut stmt = conn.prepare_cached(&format!(
                        "SELECT {} FROM ledger
                         WHERE ts_recv >= ?1 AND ts_recv <= ?2
                         ORDER BY ts_recv ASC, seq ASC",
                        SELECT_COLUMNS
                    ))?;
                    let rows = stmt
                        .query_map(params![range.start, range.end], raw_from_row)?
                        .collect::<Result<Vec<_>, _>>()?;
                    rows
                }
            }
        };

        raws.into_iter().map(decode).collect()
    }

    async fn latest_fresh(
        &self,
        symbol: &str,
        kind: SnapshotKind,
        now_ms: Millis,
        max_age_ms: Millis,
    ) -> Result<Option<LedgerEntry>> {
        let min_feed = now_ms.saturating_sub(max_age_ms);
        let raw = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {} FROM ledger
                 WHERE symbol = ?1 AND kind = ?2 AND ts_feed >= ?3
                 ORDER BY ts_recv DESC, seq DESC
                 LIMIT 1",
                SELECT_COLUMNS
            ))?;
            let mut rows = stmt
                .query_map(params![symbol, kind.as_str(), min_feed], raw_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.pop()
        };

        raw.map(decode).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::stamp;
    use super::*;
    use crate::models::{BookLevel, OrderBook, Quote};

    fn quote(ts: Millis) -> LedgerPayload {
        LedgerPayload::Quote(Quote {
            symbol: "SPY".into(),
            bid: 1.0,
            ask: 1.02,
            bid_size: 5.0,
            ask_size: 5.0,
            ts_feed: ts,
            ts_recv: ts,
            source: "opra".into(),
        })
    }

    #[tokio::test]
    async fn test_roundtrip_entries() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        ledger.record(quote(100), stamp(100)).await.unwrap();
        let book = LedgerPayload::OrderBook(OrderBook {
            symbol: "BTC-USD".into(),
            bids: vec![BookLevel { price: 99.0, size: 1.0 }],
            asks: vec![BookLevel { price: 101.0, size: 1.0 }],
            ts_feed: 200,
            ts_recv: 200,
            source: "coinbase".into(),
        });
        ledger.record(book.clone(), stamp(200)).await.unwrap();

        let all = ledger.query(None, TimeRange::since(0)).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].payload, book);
        assert_eq!(ledger.count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_and_delete_abort() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        ledger.record(quote(100), stamp(100)).await.unwrap();

        let conn = ledger.conn.lock();
        assert!(conn.execute("UPDATE ledger SET symbol = 'QQQ'", []).is_err());
        assert!(conn.execute("DELETE FROM ledger", []).is_err());
        drop(conn);

        assert_eq!(ledger.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_latest_fresh_and_file_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let path = path.to_str().unwrap();

        {
            let ledger = SqliteLedger::open(path).unwrap();
            ledger.record(quote(1_000), stamp(1_000)).await.unwrap();
            ledger.record(quote(3_000), stamp(3_000)).await.unwrap();
        }

        let reopened = SqliteLedger::open(path).unwrap();
        let latest = reopened
            .latest_fresh("SPY", SnapshotKind::Quote, 4_000, 5_000)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.stamp.ts_feed, 3_000);

        let stale = reopened
            .latest_fresh("SPY", SnapshotKind::Quote, 10_000, 5_000)
            .await
            .unwrap();
        assert!(stale.is_none());
    }
}
