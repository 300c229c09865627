//! Temporal Proof Aggregator
//!
//! Rolls recorded quotes, fills and pre-trade proofs over a window into
//! compliance percentages. Every figure is derived from one pull query of the
//! raw ledger records, so the summary can be recomputed from the ledger alone.

use crate::audit::{Millis, MILLIS_PER_DAY, MILLIS_PER_HOUR};
use crate::config::{AuditConfig, TemporalConfig};
use crate::error::ErrorCode;
use crate::ledger::{FrictionStats, LedgerEntry, LedgerPayload, SnapshotLedger, TimeRange};
use crate::proof::{ProofKind, ProofStage};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Standard trailing windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrailingWindow {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "24h")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
}

impl TrailingWindow {
    pub fn duration_ms(&self) -> Millis {
        match self {
            Self::OneHour => MILLIS_PER_HOUR,
            Self::OneDay => MILLIS_PER_DAY,
            Self::SevenDays => 7 * MILLIS_PER_DAY,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "1h" => Some(Self::OneHour),
            "24h" | "1d" => Some(Self::OneDay),
            "7d" => Some(Self::SevenDays),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCount {
    pub kind: ProofKind,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalVerdict {
    pub passed: bool,
    pub reasons: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalWindowSummary {
    pub window_start: Millis,
    pub window_end: Millis,

    pub quotes: usize,
    pub fresh_quotes: usize,
    pub nbbo_freshness_pct: f64,

    pub fills: usize,
    /// Share of fills with friction <= the soft threshold (20%).
    pub friction20_pct: f64,
    /// Share of fills with friction <= the hard threshold (25%).
    pub friction25_pct: f64,
    pub avg_friction: f64,

    pub proofs: usize,
    pub cap_violations: usize,

    pub slippage_conformance_pct: f64,

    pub pre_trade_failures: usize,
    pub post_trade_failures: usize,
    pub failures_by_kind: Vec<KindCount>,

    pub overall: TemporalVerdict,
}

#[derive(Clone)]
pub struct TemporalProofAggregator {
    config: TemporalConfig,
    quote_fresh_ms: Millis,
    options_cap_pct: f64,
    ledger: Arc<dyn SnapshotLedger>,
}

impl TemporalProofAggregator {
    pub fn new(
        config: TemporalConfig,
        audit: &AuditConfig,
        options_cap_pct: f64,
        ledger: Arc<dyn SnapshotLedger>,
    ) -> Self {
        Self {
            config,
            quote_fresh_ms: audit.quote_fresh_ms,
            options_cap_pct,
            ledger,
        }
    }

    pub async fn summarize(&self, window_start: Millis, window_end: Millis) -> Result<TemporalWindowSummary> {
        let entries = self
            .ledger
            .query(None, TimeRange::new(window_start, window_end))
            .await?;
        let summary = self.summarize_entries(window_start, window_end, &entries);

        if summary.overall.passed {
            info!(
                window_start,
                window_end,
                fills = summary.fills,
                quotes = summary.quotes,
                "temporal window compliant"
            );
        } else {
            warn!(
                window_start,
                window_end,
                reasons = ?summary.overall.reasons,
                "temporal window breached"
            );
        }
        Ok(summary)
    }

    /// Pure roll-up over already-fetched ledger entries.
    pub fn summarize_entries(
        &self,
        window_start: Millis,
        window_end: Millis,
        entries: &[LedgerEntry],
    ) -> TemporalWindowSummary {
        let c = &self.config;
        let mut reasons = Vec::new();
        let mut warnings = Vec::new();

        // ===== NBBO freshness =====
        let quotes: Vec<_> = entries
            .iter()
            .filter_map(|e| match &e.payload {
                LedgerPayload::Quote(q) => Some(q),
                _ => None,
            })
            .collect();
        let fresh_quotes = quotes
            .iter()
            .filter(|q| q.ts_recv - q.ts_feed <= self.quote_fresh_ms && q.ts_recv >= q.ts_feed)
            .count();

        let fills: Vec<_> = entries
            .iter()
            .filter_map(|e| match &e.payload {
                LedgerPayload::Fill(f) => Some(f),
                _ => None,
            })
            .collect();

        let nbbo_freshness_pct = if quotes.is_empty() {
            if fills.is_empty() {
                warnings.push("no NBBO quotes recorded in window; freshness not measured".to_string());
            } else {
                reasons.push(ErrorCode::DataMissing.reason(format!(
                    "no NBBO quotes recorded in window containing {} fills",
                    fills.len()
                )));
            }
            0.0
        } else {
            fresh_quotes as f64 / quotes.len() as f64
        };
        if !quotes.is_empty() && nbbo_freshness_pct < c.nbbo_fresh_min_pct {
            reasons.push(ErrorCode::DataStale.reason(format!(
                "NBBO freshness {:.1}% below {:.1}%",
                nbbo_freshness_pct * 100.0,
                c.nbbo_fresh_min_pct * 100.0
            )));
        }

        // ===== Friction =====
        let friction = FrictionStats::from_entries(
            entries,
            c.friction_soft_threshold,
            c.friction_hard_threshold,
        );
        if friction.soft_pct < c.friction_soft_min_pct {
            reasons.push(ErrorCode::FrictionExceeded.reason(format!(
                "{:.1}% of fills within {:.0}% friction, need {:.1}%",
                friction.soft_pct * 100.0,
                c.friction_soft_threshold * 100.0,
                c.friction_soft_min_pct * 100.0
            )));
        }
        if friction.within_hard < friction.fills {
            reasons.push(ErrorCode::FrictionExceeded.reason(format!(
                "{} fill(s) above hard friction cap {:.0}%",
                friction.fills - friction.within_hard,
                c.friction_hard_threshold * 100.0
            )));
        }

        // ===== Caps =====
        let proofs: Vec<_> = entries
            .iter()
            .filter_map(|e| match &e.payload {
                LedgerPayload::Proof(p) => Some(p),
                _ => None,
            })
            .collect();
        // rejected proofs never committed capital
        let cap_violations = proofs
            .iter()
            .filter(|p| p.passed && p.options_used_pct > p.options_cap_pct.min(self.options_cap_pct))
            .count();
        if cap_violations > 0 {
            reasons.push(ErrorCode::CapExceeded.reason(format!(
                "{} options cap violation(s) in window (zero tolerance)",
                cap_violations
            )));
        }

        // ===== Slippage conformance =====
        let conforming = fills
            .iter()
            .filter(|f| f.slippage_pct <= f.planned_max_slippage_pct * c.slippage_tolerance_mult)
            .count();
        let slippage_conformance_pct = if fills.is_empty() {
            1.0
        } else {
            conforming as f64 / fills.len() as f64
        };
        if slippage_conformance_pct < c.slippage_conformance_min_pct {
            reasons.push(ErrorCode::SlippageExceeded.reason(format!(
                "{:.1}% of trades within {}x planned slippage, need {:.1}%",
                slippage_conformance_pct * 100.0,
                c.slippage_tolerance_mult,
                c.slippage_conformance_min_pct * 100.0
            )));
        }

        // ===== Failure breakdown =====
        let mut pre_trade_failures = 0;
        let mut post_trade_failures = 0;
        let mut failures_by_kind: Vec<KindCount> = Vec::new();
        let failed_kinds = proofs
            .iter()
            .flat_map(|p| p.failed_kinds.iter())
            .chain(fills.iter().flat_map(|f| f.failed_kinds.iter()));
        for kind in failed_kinds {
            match kind.stage() {
                ProofStage::PreTrade => pre_trade_failures += 1,
                ProofStage::PostTrade => post_trade_failures += 1,
            }
            match failures_by_kind.iter_mut().find(|k| k.kind == *kind) {
                Some(k) => k.count += 1,
                None => failures_by_kind.push(KindCount {
                    kind: *kind,
                    count: 1,
                }),
            }
        }

        TemporalWindowSummary {
            window_start,
            window_end,
            quotes: quotes.len(),
            fresh_quotes,
            nbbo_freshness_pct,
            fills: friction.fills,
            friction20_pct: friction.soft_pct,
            friction25_pct: friction.hard_pct,
            avg_friction: friction.avg_friction,
            proofs: proofs.len(),
            cap_violations,
            slippage_conformance_pct,
            pre_trade_failures,
            post_trade_failures,
            failures_by_kind,
            overall: TemporalVerdict {
                passed: reasons.is_empty(),
                reasons,
                warnings,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditStamp;
    use crate::ledger::{FillRecord, MemoryLedger, ProofRecord};
    use crate::models::{AssetClass, Quote, StructureKind};

    fn stamp(ts: Millis) -> AuditStamp {
        AuditStamp {
            ts_feed: ts,
            ts_recv: ts,
            server_ts: ts,
            commit_hash: "test".into(),
            policy_hash: "0".repeat(64),
            environment: "test".into(),
        }
    }

    fn quote(ts: Millis, lag: Millis) -> LedgerPayload {
        LedgerPayload::Quote(Quote {
            symbol: "SPY".into(),
            bid: 1.0,
            ask: 1.02,
            bid_size: 1.0,
            ask_size: 1.0,
            ts_feed: ts - lag,
            ts_recv: ts,
            source: "opra".into(),
        })
    }

    fn fill(id: &str, friction: f64, slippage: f64) -> LedgerPayload {
        LedgerPayload::Fill(FillRecord {
            trade_id: id.into(),
            symbol: "SPY".into(),
            asset_class: AssetClass::Options,
            fill_price: 1.5,
            quantity: 1.0,
            fees: 1.3,
            premium: 150.0,
            friction_pct: friction,
            slippage_pct: slippage,
            planned_max_slippage_pct: 0.02,
            passed: true,
            failed_kinds: vec![],
        })
    }

    fn proof(used: f64) -> LedgerPayload {
        LedgerPayload::Proof(ProofRecord {
            symbol: "SPY".into(),
            structure: StructureKind::DebitVertical,
            contracts: 1,
            total_cost: 155.0,
            options_used_pct: used,
            options_cap_pct: 0.25,
            passed: true,
            failed_kinds: vec![],
            reasons: vec![],
        })
    }

    async fn aggregator_with(payloads: Vec<(Millis, LedgerPayload)>) -> TemporalProofAggregator {
        let ledger = Arc::new(MemoryLedger::new());
        for (ts, payload) in payloads {
            ledger.record(payload, stamp(ts)).await.unwrap();
        }
        TemporalProofAggregator::new(
            TemporalConfig::default(),
            &AuditConfig::default(),
            0.25,
            ledger,
        )
    }

    #[tokio::test]
    async fn test_empty_window_passes_vacuously_with_warning() {
        let agg = aggregator_with(vec![]).await;
        let summary = agg.summarize(0, 1_000).await.unwrap();
        assert_eq!(summary.fills, 0);
        assert_eq!(summary.friction20_pct, 1.0);
        assert_eq!(summary.friction25_pct, 1.0);
        assert!(summary.overall.passed);
        assert_eq!(summary.overall.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_fills_without_quotes_fail() {
        let agg = aggregator_with(vec![(100, fill("a", 0.05, 0.01))]).await;
        let summary = agg.summarize(0, 1_000).await.unwrap();
        assert!(!summary.overall.passed);
        assert!(summary.overall.reasons[0].starts_with("DATA_MISSING"));
    }

    #[tokio::test]
    async fn test_cap_violation_zero_tolerance() {
        let agg = aggregator_with(vec![
            (100, quote(100, 10)),
            (200, proof(0.10)),
            (300, proof(0.26)),
        ])
        .await;
        let summary = agg.summarize(0, 1_000).await.unwrap();
        assert_eq!(summary.cap_violations, 1);
        assert!(!summary.overall.passed);
        assert!(summary.overall.reasons.iter().any(|r| r.starts_with("CAP_EXCEEDED")));
    }

    #[tokio::test]
    async fn test_rejected_proof_over_cap_is_not_a_violation() {
        let mut rejected = proof(0.40);
        if let LedgerPayload::Proof(p) = &mut rejected {
            p.passed = false;
            p.failed_kinds = vec![ProofKind::Caps];
        }
        let agg = aggregator_with(vec![(100, quote(100, 10)), (200, rejected)]).await;
        let summary = agg.summarize(0, 1_000).await.unwrap();
        assert_eq!(summary.cap_violations, 0);
        assert_eq!(summary.pre_trade_failures, 1);
        assert!(summary.overall.passed, "{:?}", summary.overall.reasons);
    }

    #[tokio::test]
    async fn test_friction_thresholds() {
        let mut payloads = vec![(50, quote(50, 10))];
        for i in 0..9 {
            payloads.push((100 + i, fill(&format!("f{}", i), 0.05, 0.01)));
        }
        payloads.push((200, fill("wide", 0.22, 0.01)));
        let agg = aggregator_with(payloads).await;
        let summary = agg.summarize(0, 1_000).await.unwrap();

        // 9/10 within 20% meets the 90% soft floor; all within 25%.
        assert!((summary.friction20_pct - 0.9).abs() < 1e-12);
        assert_eq!(summary.friction25_pct, 1.0);
        assert!(summary.overall.passed, "{:?}", summary.overall.reasons);
    }

    #[tokio::test]
    async fn test_hard_friction_breach_fails() {
        let agg = aggregator_with(vec![(50, quote(50, 10)), (100, fill("x", 0.30, 0.01))]).await;
        let summary = agg.summarize(0, 1_000).await.unwrap();
        assert!(summary.friction25_pct < 1.0);
        assert!(!summary.overall.passed);
    }

    #[tokio::test]
    async fn test_stale_quotes_and_slippage() {
        let agg = aggregator_with(vec![
            (100, quote(100, 10)),
            (200, quote(200, 9_000)),
            (300, fill("s", 0.05, 0.05)),
        ])
        .await;
        let summary = agg.summarize(0, 1_000).await.unwrap();
        assert_eq!(summary.nbbo_freshness_pct, 0.5);
        assert_eq!(summary.slippage_conformance_pct, 0.0);
        let codes: Vec<_> = summary
            .overall
            .reasons
            .iter()
            .map(|r| r.split(':').next().unwrap_or("").to_string())
            .collect();
        assert!(codes.contains(&"DATA_STALE".to_string()));
        assert!(codes.contains(&"SLIPPAGE_EXCEEDED".to_string()));
    }

    #[tokio::test]
    async fn test_window_bounds_exclude_outside_entries() {
        let agg = aggregator_with(vec![(100, quote(100, 10)), (5_000, proof(0.9))]).await;
        let summary = agg.summarize(0, 1_000).await.unwrap();
        assert_eq!(summary.cap_violations, 0);
        assert!(summary.overall.passed);
    }

    #[test]
    fn test_trailing_window_parse() {
        assert_eq!(TrailingWindow::parse("24h"), Some(TrailingWindow::OneDay));
        assert_eq!(TrailingWindow::SevenDays.duration_ms(), 604_800_000);
        assert!(TrailingWindow::parse("2w").is_none());
    }
}
