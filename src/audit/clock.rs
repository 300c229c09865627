//! Audit Clock
//!
//! Stamps every operation with a (feed, receipt, server) timestamp triple plus
//! the build and policy identity, and owns the freshness thresholds.
//! Server time always comes from the injected [`TimeSource`], never from the
//! caller.

use crate::config::{AuditConfig, DataMode, SafetyConfig};
use crate::error::ProofError;
use crate::models::SnapshotKind;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Milliseconds since Unix epoch.
pub type Millis = i64;

pub const MILLIS_PER_SEC: Millis = 1_000;
pub const MILLIS_PER_HOUR: Millis = 3_600_000;
pub const MILLIS_PER_DAY: Millis = 86_400_000;

/// Source of "now".
pub trait TimeSource: Send + Sync {
    fn now_ms(&self) -> Millis;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> Millis {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually driven clock for replays and tests.
#[derive(Debug, Default)]
pub struct FixedTimeSource {
    now: AtomicI64,
}

impl FixedTimeSource {
    pub fn new(start: Millis) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn set(&self, now: Millis) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, delta: Millis) {
        debug_assert!(delta >= 0, "FixedTimeSource: negative advance {}", delta);
        self.now.fetch_add(delta, Ordering::SeqCst);
    }
}

impl TimeSource for FixedTimeSource {
    fn now_ms(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}

/// Timestamp triple plus provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStamp {
    pub ts_feed: Millis,
    pub ts_recv: Millis,
    pub server_ts: Millis,
    pub commit_hash: String,
    pub policy_hash: String,
    pub environment: String,
}

/// Stamping and freshness authority.
#[derive(Clone)]
pub struct AuditClock {
    config: AuditConfig,
    data_mode: DataMode,
    commit_hash: String,
    policy_hash: String,
    environment: String,
    time: Arc<dyn TimeSource>,
}

impl std::fmt::Debug for AuditClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditClock")
            .field("data_mode", &self.data_mode)
            .field("environment", &self.environment)
            .field("commit_hash", &self.commit_hash)
            .field("policy_hash", &self.policy_hash)
            .finish()
    }
}

impl AuditClock {
    pub fn new(config: &SafetyConfig, time: Arc<dyn TimeSource>) -> Self {
        Self {
            config: config.audit.clone(),
            data_mode: config.runtime.data_mode,
            commit_hash: config.runtime.commit_hash.clone(),
            policy_hash: config.policy_hash(),
            environment: config.runtime.environment.clone(),
            time,
        }
    }

    pub fn now_ms(&self) -> Millis {
        self.time.now_ms()
    }

    pub fn data_mode(&self) -> DataMode {
        self.data_mode
    }

    pub fn policy_hash(&self) -> &str {
        &self.policy_hash
    }

    /// Stamp an operation.
    ///
    /// Missing inputs default to the server time (receipt) and the receipt
    /// time (feed). Ordering is validated only when both are supplied.
    pub fn stamp(
        &self,
        ts_feed: Option<Millis>,
        ts_recv: Option<Millis>,
    ) -> Result<AuditStamp, ProofError> {
        let server_ts = self.now_ms();

        if let (Some(feed), Some(recv)) = (ts_feed, ts_recv) {
            if recv < feed {
                warn!(ts_feed = feed, ts_recv = recv, "out-of-order snapshot");
                return Err(ProofError::OutOfOrderSnapshot {
                    ts_feed: feed,
                    ts_recv: recv,
                });
            }
            let lag_ms = server_ts - recv;
            if lag_ms > self.config.max_out_of_order_ms {
                warn!(lag_ms, max_ms = self.config.max_out_of_order_ms, "stale snapshot");
                return Err(ProofError::StaleSnapshot {
                    lag_ms,
                    max_ms: self.config.max_out_of_order_ms,
                });
            }
        }

        let ts_recv = ts_recv.unwrap_or(server_ts);
        let ts_feed = ts_feed.unwrap_or(ts_recv);

        Ok(AuditStamp {
            ts_feed,
            ts_recv,
            server_ts,
            commit_hash: self.commit_hash.clone(),
            policy_hash: self.policy_hash.clone(),
            environment: self.environment.clone(),
        })
    }

    /// Maximum age for a snapshot kind.
    pub fn freshness_threshold(&self, kind: SnapshotKind) -> Millis {
        match kind {
            SnapshotKind::Quote => self.config.quote_fresh_ms,
            SnapshotKind::Chain => self.config.chain_fresh_ms,
            SnapshotKind::OrderBook => self.config.order_book_fresh_ms,
            SnapshotKind::Fill | SnapshotKind::Proof => self.config.max_out_of_order_ms,
        }
    }

    /// Age of `timestamp` relative to server time.
    pub fn age_ms(&self, timestamp: Millis) -> Millis {
        self.now_ms() - timestamp
    }

    /// Timestamps further in the future than the ordering skew are not fresh.
    pub fn is_fresh(&self, timestamp: Millis, kind: SnapshotKind) -> bool {
        let age = self.age_ms(timestamp);
        age <= self.freshness_threshold(kind) && age >= -self.config.max_out_of_order_ms
    }

    /// Fail unless the process is in real-data mode and the payload carries no
    /// synthetic-data marker.
    pub fn enforce_mode<T: Serialize + ?Sized>(
        &self,
        operation: &str,
        payload: &T,
    ) -> Result<(), ProofError> {
        if self.data_mode != DataMode::Real {
            warn!(operation, mode = self.data_mode.as_str(), "rejecting non-real data mode");
            return Err(ProofError::InvalidDataMode {
                mode: self.data_mode.as_str().to_string(),
                operation: operation.to_string(),
            });
        }

        let serialized = match serde_json::to_string(payload) {
            Ok(s) => s.to_lowercase(),
            Err(e) => {
                warn!(operation, error = %e, "payload could not be serialized for audit");
                return Err(ProofError::ForbiddenSyntheticData {
                    marker: "<unserializable>".to_string(),
                    operation: operation.to_string(),
                });
            }
        };

        if let Some(marker) = self
            .config
            .forbidden_markers
            .iter()
            .find(|m| serialized.contains(m.to_lowercase().as_str()))
        {
            warn!(operation, marker = %marker, "synthetic-data marker in payload");
            return Err(ProofError::ForbiddenSyntheticData {
                marker: marker.clone(),
                operation: operation.to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    const NOW: Millis = 1_700_000_000_000;

    fn clock_with(config: SafetyConfig) -> (AuditClock, Arc<FixedTimeSource>) {
        let time = Arc::new(FixedTimeSource::new(NOW));
        (AuditClock::new(&config, time.clone()), time)
    }

    fn clock() -> (AuditClock, Arc<FixedTimeSource>) {
        clock_with(SafetyConfig::default())
    }

    #[test]
    fn test_stamp_valid_triple() {
        let (clock, _) = clock();
        let stamp = clock.stamp(Some(NOW - 200), Some(NOW - 100)).unwrap();
        assert_eq!(stamp.server_ts, NOW);
        assert_eq!(stamp.ts_feed, NOW - 200);
        assert_eq!(stamp.policy_hash.len(), 64);
        assert_eq!(stamp.environment, "production");
    }

    #[test]
    fn test_stamp_rejects_out_of_order() {
        let (clock, _) = clock();
        let err = clock.stamp(Some(NOW - 100), Some(NOW - 200)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::OutOfOrderSnapshot);
    }

    #[test]
    fn test_stamp_rejects_stale_receipt() {
        let (clock, _) = clock();
        let err = clock.stamp(Some(NOW - 9_000), Some(NOW - 8_000)).unwrap_err();
        assert!(matches!(err, ProofError::StaleSnapshot { lag_ms: 8_000, .. }));
    }

    #[test]
    fn test_stamp_boundary_is_inclusive() {
        let (clock, _) = clock();
        assert!(clock.stamp(Some(NOW - 5_000), Some(NOW - 5_000)).is_ok());
        assert!(clock.stamp(Some(NOW - 5_001), Some(NOW - 5_001)).is_err());
    }

    #[test]
    fn test_stamp_fills_missing_inputs() {
        let (clock, _) = clock();
        let stamp = clock.stamp(None, None).unwrap();
        assert_eq!(stamp.ts_recv, NOW);
        assert_eq!(stamp.ts_feed, NOW);

        let stamp = clock.stamp(None, Some(NOW - 10)).unwrap();
        assert_eq!(stamp.ts_feed, NOW - 10);
    }

    #[test]
    fn test_is_fresh_per_kind() {
        let (clock, time) = clock();
        let ts = NOW - 3_000;
        assert!(clock.is_fresh(ts, SnapshotKind::Quote));
        assert!(clock.is_fresh(ts, SnapshotKind::Chain));
        assert!(!clock.is_fresh(ts, SnapshotKind::OrderBook));

        time.advance(2_001);
        assert!(!clock.is_fresh(ts, SnapshotKind::Quote));
    }

    #[test]
    fn test_far_future_is_not_fresh() {
        let (clock, _) = clock();
        assert!(!clock.is_fresh(NOW + 60_000, SnapshotKind::Quote));
    }

    #[test]
    fn test_enforce_mode_real_clean_payload() {
        let (clock, _) = clock();
        let payload = serde_json::json!({"symbol": "SPY", "source": "opra"});
        assert!(clock.enforce_mode("size_position", &payload).is_ok());
    }

    #[test]
    fn test_enforce_mode_rejects_paper() {
        let mut config = SafetyConfig::default();
        config.runtime.data_mode = DataMode::Paper;
        let (clock, _) = clock_with(config);
        let err = clock.enforce_mode("size_position", &"{}").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidDataMode);
    }

    #[test]
    fn test_enforce_mode_rejects_markers_case_insensitive() {
        let (clock, _) = clock();
        let payload = serde_json::json!({"source": "MockFeed"});
        let err = clock.enforce_mode("verify_fill", &payload).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ForbiddenSyntheticData);

        let payload = serde_json::json!({"note": "price = Math.random()"});
        assert!(clock.enforce_mode("verify_fill", &payload).is_err());
    }
}
