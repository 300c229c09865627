//! Reason codes and hard-failure errors.
//!
//! Invariant checks never raise: they return a `ProofResult` whose reasons are
//! prefixed with an [`ErrorCode`]. Only violations of the audit / data-mode
//! contract surface as [`ProofError`], because they mean the proof itself
//! cannot be trusted.

use serde::{Deserialize, Serialize};

/// Closed reason-code taxonomy shared by every proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    DataStale,
    DataMissing,
    OutOfOrderSnapshot,
    ForbiddenStructure,
    InsufficientCash,
    CapExceeded,
    PoolFrozen,
    FrictionExceeded,
    GreeksBudgetExceeded,
    ShockTestFailed,
    GovernorActive,
    EventRiskBlocked,
    SlippageExceeded,
    FillQualityInsufficient,
    OrderBookUnavailable,
    FeeAnomalous,
    InvalidDataMode,
    ForbiddenSyntheticData,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataStale => "DATA_STALE",
            Self::DataMissing => "DATA_MISSING",
            Self::OutOfOrderSnapshot => "OUT_OF_ORDER_SNAPSHOT",
            Self::ForbiddenStructure => "FORBIDDEN_STRUCTURE",
            Self::InsufficientCash => "INSUFFICIENT_CASH",
            Self::CapExceeded => "CAP_EXCEEDED",
            Self::PoolFrozen => "POOL_FROZEN",
            Self::FrictionExceeded => "FRICTION_EXCEEDED",
            Self::GreeksBudgetExceeded => "GREEKS_BUDGET_EXCEEDED",
            Self::ShockTestFailed => "SHOCK_TEST_FAILED",
            Self::GovernorActive => "GOVERNOR_ACTIVE",
            Self::EventRiskBlocked => "EVENT_RISK_BLOCKED",
            Self::SlippageExceeded => "SLIPPAGE_EXCEEDED",
            Self::FillQualityInsufficient => "FILL_QUALITY_INSUFFICIENT",
            Self::OrderBookUnavailable => "ORDER_BOOK_UNAVAILABLE",
            Self::FeeAnomalous => "FEE_ANOMALOUS",
            Self::InvalidDataMode => "INVALID_DATA_MODE",
            Self::ForbiddenSyntheticData => "FORBIDDEN_SYNTHETIC_DATA",
        }
    }

    /// Format a reason line carrying this code.
    pub fn reason(&self, message: impl AsRef<str>) -> String {
        format!("{}: {}", self.as_str(), message.as_ref())
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural failures that abort the operation being stamped or proven.
#[derive(Debug, Clone, PartialEq)]
pub enum ProofError {
    /// `ts_recv` precedes `ts_feed`.
    OutOfOrderSnapshot { ts_feed: i64, ts_recv: i64 },
    /// Receipt time is further behind server time than the allowed skew.
    StaleSnapshot { lag_ms: i64, max_ms: i64 },
    /// The process is not configured for real-data-only operation.
    InvalidDataMode { mode: String, operation: String },
    /// A serialized payload carries a synthetic-data marker.
    ForbiddenSyntheticData { marker: String, operation: String },
}

impl ProofError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::OutOfOrderSnapshot { .. } => ErrorCode::OutOfOrderSnapshot,
            Self::StaleSnapshot { .. } => ErrorCode::DataStale,
            Self::InvalidDataMode { .. } => ErrorCode::InvalidDataMode,
            Self::ForbiddenSyntheticData { .. } => ErrorCode::ForbiddenSyntheticData,
        }
    }
}

impl std::fmt::Display for ProofError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfOrderSnapshot { ts_feed, ts_recv } => write!(
                f,
                "{}: receipt time {} precedes feed time {}",
                self.code(),
                ts_recv,
                ts_feed
            ),
            Self::StaleSnapshot { lag_ms, max_ms } => write!(
                f,
                "{}: snapshot received {}ms before server time, max {}ms",
                self.code(),
                lag_ms,
                max_ms
            ),
            Self::InvalidDataMode { mode, operation } => write!(
                f,
                "{}: operation '{}' requires real data mode, process is in '{}'",
                self.code(),
                operation,
                mode
            ),
            Self::ForbiddenSyntheticData { marker, operation } => write!(
                f,
                "{}: payload for '{}' contains forbidden marker '{}'",
                self.code(),
                operation,
                marker
            ),
        }
    }
}

impl std::error::Error for ProofError {}
