//! Proof Engine
//!
//! Facade that wires the audit clock, ledger, market-data feed, gates,
//! classifier and reaction-statistics store behind one async API. Every
//! entry point that can influence a risk decision checks the data mode first.

use crate::audit::{AuditClock, Millis, TimeSource, MILLIS_PER_DAY};
use crate::config::SafetyConfig;
use crate::error::ErrorCode;
use crate::ledger::{
    LedgerFeed, LedgerPayload, MarketDataFeed, ProofRecord, SnapshotLedger,
};
use crate::models::{
    ChainQuality, EventSignal, FillReport, MarketSnapshot, PoolStatus, PositionRequest,
    PreTradePromise,
};
use crate::proof::OverallProof;
use crate::risk::{
    GovernorState, PositionSizer, PositionSizingResult, PostTradeProver, TemporalProofAggregator,
    TemporalWindowSummary, ThetaGovernor, TrailingWindow,
};
use crate::signals::{
    ClassifierStats, EventClassifier, HistoricalCorpus, ReactionStatsBuilder, ReactionStatsStore,
    ReactionStatsTable,
};
use anyhow::{Context, Result};
use metrics::counter;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How far back a quote is fetched; the sizer decides whether it is fresh.
const QUOTE_LOOKBACK_MS: Millis = MILLIS_PER_DAY;

/// Trading days of theta-breach history retained.
const THETA_HISTORY_DAYS: usize = 30;

pub struct ProofEngine {
    config: Arc<SafetyConfig>,
    clock: AuditClock,
    ledger: Arc<dyn SnapshotLedger>,
    feed: Arc<dyn MarketDataFeed>,
    sizer: PositionSizer,
    prover: PostTradeProver,
    temporal: TemporalProofAggregator,
    governor: ThetaGovernor,
    classifier: EventClassifier,
    stats_builder: ReactionStatsBuilder,
    stats: ReactionStatsStore,
    pool: RwLock<PoolStatus>,
    signals: RwLock<VecDeque<EventSignal>>,
}

impl ProofEngine {
    /// Engine whose market data is read back from the ledger itself.
    pub fn new(
        config: SafetyConfig,
        ledger: Arc<dyn SnapshotLedger>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        let feed = Arc::new(LedgerFeed::new(
            ledger.clone(),
            time.clone(),
            config.audit.chain_fresh_ms,
        ));
        Self::with_feed(config, ledger, feed, time)
    }

    pub fn with_feed(
        config: SafetyConfig,
        ledger: Arc<dyn SnapshotLedger>,
        feed: Arc<dyn MarketDataFeed>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        let clock = AuditClock::new(&config, time);
        let temporal = TemporalProofAggregator::new(
            config.temporal.clone(),
            &config.audit,
            config.proofs.options_cap_pct,
            ledger.clone(),
        );
        let signal_buffer = config.runtime.signal_buffer;

        info!(
            data_mode = config.runtime.data_mode.as_str(),
            environment = %config.runtime.environment,
            policy_hash = %clock.policy_hash(),
            "proof engine ready"
        );

        Self {
            sizer: PositionSizer::new(&config),
            prover: PostTradeProver::new(config.post_trade.clone()),
            governor: ThetaGovernor::new(&config.proofs),
            classifier: EventClassifier::new(config.classifier.clone()),
            stats_builder: ReactionStatsBuilder::new(
                config.reaction_stats.clone(),
                config.classifier.clone(),
            ),
            stats: ReactionStatsStore::new(),
            pool: RwLock::new(PoolStatus::new(0.0, 0.0, 0.0)),
            signals: RwLock::new(VecDeque::with_capacity(signal_buffer)),
            config: Arc::new(config),
            clock,
            ledger,
            feed,
            temporal,
        }
    }

    pub fn config(&self) -> &SafetyConfig {
        &self.config
    }

    pub fn clock(&self) -> &AuditClock {
        &self.clock
    }

    pub fn ledger(&self) -> &Arc<dyn SnapshotLedger> {
        &self.ledger
    }

    fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.config.runtime.io_timeout_ms)
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    /// Stamp and append a market snapshot.
    pub async fn record_snapshot(&self, snapshot: MarketSnapshot) -> Result<u64> {
        self.clock.enforce_mode("record_snapshot", &snapshot)?;
        let stamp = self
            .clock
            .stamp(Some(snapshot.ts_feed()), Some(snapshot.ts_recv()))?;
        let symbol = snapshot.symbol().to_string();
        let kind = snapshot.kind();
        let seq = self
            .ledger
            .record(LedgerPayload::from(snapshot), stamp)
            .await
            .context("failed to record snapshot")?;
        debug!(seq, symbol = %symbol, kind = kind.as_str(), "snapshot recorded");
        Ok(seq)
    }

    // =========================================================================
    // PRE-TRADE
    // =========================================================================

    /// Size a request against live data and the current pool.
    ///
    /// Quote age, chain quality, spread and underlying price always come from
    /// the live lookup; caller-supplied values are overwritten, so an absent
    /// quote or chain rejects with `DATA_MISSING`. Fetch failures and timeouts
    /// reject with no data.
    pub async fn size_position(
        &self,
        mut request: PositionRequest,
        proof_mode: bool,
    ) -> Result<PositionSizingResult> {
        self.clock.enforce_mode("size_position", &request)?;

        let symbol = request.symbol.clone();
        let fetch = async {
            tokio::join!(
                self.feed.get_latest_quote(&symbol, QUOTE_LOOKBACK_MS),
                self.feed.get_chain(&symbol)
            )
        };

        let (quote, chain) = match tokio::time::timeout(self.io_timeout(), fetch).await {
            Ok((Ok(quote), Ok(chain))) => (quote, chain),
            Ok((Err(e), _)) | Ok((_, Err(e))) => {
                warn!(symbol = %symbol, error = %e, "snapshot fetch failed");
                return Ok(self.reject_no_data(
                    &request,
                    ErrorCode::DataMissing,
                    &format!("snapshot fetch failed: {}", e),
                ));
            }
            Err(_) => {
                warn!(symbol = %symbol, timeout_ms = self.config.runtime.io_timeout_ms, "snapshot fetch timed out");
                return Ok(self.reject_no_data(
                    &request,
                    ErrorCode::DataMissing,
                    &format!(
                        "snapshot fetch exceeded {}ms",
                        self.config.runtime.io_timeout_ms
                    ),
                ));
            }
        };

        request.quote_age_ms = quote.as_ref().map(|q| self.clock.age_ms(q.ts_feed));
        request.chain_quality = chain.as_ref().map(ChainQuality::from_chain);
        if let Some(q) = &quote {
            request.spread_pct = q.spread_pct();
            request.underlying_price = q.mid();
        }
        {
            let live = self.signals.read();
            request
                .event_signals
                .extend(live.iter().filter(|s| s.mentions(&symbol)).cloned());
        }

        let pool = self.pool.read().clone();
        let result = self.sizer.size(&request, proof_mode, &pool);

        if result.proof.is_some() || result.approved {
            self.record_proof(&result, &pool).await?;
        }
        Ok(result)
    }

    fn reject_no_data(
        &self,
        request: &PositionRequest,
        code: ErrorCode,
        message: &str,
    ) -> PositionSizingResult {
        counter!("riskproof_sizing_total", 1, "verdict" => "no_data");
        PositionSizingResult::no_data(request, code, message)
    }

    /// Fast-path approvals carry no subproofs and record no failures.
    fn proof_record(&self, result: &PositionSizingResult, pool: &PoolStatus) -> ProofRecord {
        let options_used_pct = if pool.pool_equity > 0.0 {
            (pool.options_used + result.total_cost) / pool.pool_equity
        } else {
            f64::INFINITY
        };
        ProofRecord {
            symbol: result.symbol.clone(),
            structure: result.structure,
            contracts: result.contracts,
            total_cost: result.total_cost,
            options_used_pct,
            options_cap_pct: self.config.proofs.options_cap_pct,
            passed: result.approved,
            failed_kinds: result
                .proof
                .as_ref()
                .map(OverallProof::failed_kinds)
                .unwrap_or_default(),
            reasons: result
                .proof
                .as_ref()
                .map(|p| p.reasons.clone())
                .unwrap_or_default(),
        }
    }

    async fn record_proof(&self, result: &PositionSizingResult, pool: &PoolStatus) -> Result<()> {
        let record = self.proof_record(result, pool);
        let stamp = self.clock.stamp(None, None)?;
        self.ledger
            .record(LedgerPayload::Proof(record), stamp)
            .await
            .context("failed to record proof")?;
        Ok(())
    }

    // =========================================================================
    // POST-TRADE
    // =========================================================================

    /// Verify a fill against its promise and record the outcome.
    pub async fn verify_fill(
        &self,
        promise: &PreTradePromise,
        fill: FillReport,
    ) -> Result<OverallProof> {
        self.clock.enforce_mode("verify_fill", promise)?;
        self.clock.enforce_mode("verify_fill", &fill)?;
        // a fill dated after server time is out of order
        let stamp = self
            .clock
            .stamp(Some(fill.timestamp), Some(self.clock.now_ms()))?;

        let mut fill = fill;
        if fill.order_book.is_none() {
            let max_age = self.config.post_trade.order_book_max_age_ms;
            let lookup = self
                .feed
                .get_order_book_at_time(&fill.symbol, fill.timestamp, max_age);
            match tokio::time::timeout(self.io_timeout(), lookup).await {
                Ok(Ok(book)) => fill.order_book = book,
                Ok(Err(e)) => {
                    warn!(trade_id = %fill.trade_id, error = %e, "order book lookup failed")
                }
                Err(_) => warn!(trade_id = %fill.trade_id, "order book lookup timed out"),
            }
        }

        let proof = self.prover.verify(promise, &fill);
        let record = self.prover.fill_record(promise, &fill, &proof);
        self.ledger
            .record(LedgerPayload::Fill(record), stamp)
            .await
            .context("failed to record fill")?;
        Ok(proof)
    }

    // =========================================================================
    // TEMPORAL
    // =========================================================================

    pub async fn summarize_window(&self, start: Millis, end: Millis) -> Result<TemporalWindowSummary> {
        self.temporal.summarize(start, end).await
    }

    pub async fn summarize_trailing(&self, window: TrailingWindow) -> Result<TemporalWindowSummary> {
        let end = self.clock.now_ms();
        self.temporal.summarize(end - window.duration_ms(), end).await
    }

    // =========================================================================
    // SIGNALS
    // =========================================================================

    /// Classify a live headline, annotate it with validated statistics and
    /// keep it for the event-risk proof.
    pub fn classify(&self, headline: &str, source: &str, tickers: &[String]) -> Vec<EventSignal> {
        let mut signals = self
            .classifier
            .classify(headline, source, tickers, self.clock.now_ms());
        self.stats.annotate(&mut signals);

        if !signals.is_empty() {
            let cap = self.config.runtime.signal_buffer;
            let mut live = self.signals.write();
            for signal in &signals {
                if live.len() >= cap {
                    live.pop_front();
                }
                live.push_back(signal.clone());
            }
        }
        signals
    }

    pub fn live_signals(&self) -> Vec<EventSignal> {
        self.signals.read().iter().cloned().collect()
    }

    pub fn classifier_stats(&self) -> ClassifierStats {
        self.classifier.stats()
    }

    /// Rebuild the reaction-statistics table and publish it atomically.
    pub async fn rebuild_reaction_stats(
        &self,
        corpus: &dyn HistoricalCorpus,
        lookback_days: i64,
        min_samples: usize,
    ) -> Result<Arc<ReactionStatsTable>> {
        let table = self
            .stats_builder
            .build(corpus, lookback_days, min_samples, self.clock.now_ms())
            .await?;
        let groups = table.groups.len();
        self.stats.swap(table);

        let mut live = self.signals.write();
        let buffer = live.make_contiguous();
        self.stats.annotate(buffer);
        info!(groups, "reaction stats published");

        Ok(self.stats.current())
    }

    pub fn reaction_stats(&self) -> Arc<ReactionStatsTable> {
        self.stats.current()
    }

    // =========================================================================
    // POOL
    // =========================================================================

    /// Replace the pool snapshot. An empty theta history keeps the current one.
    pub fn update_pool_status(&self, status: PoolStatus) {
        let mut pool = self.pool.write();
        let history = std::mem::take(&mut pool.theta_breach_history);
        *pool = status;
        if pool.theta_breach_history.is_empty() {
            pool.theta_breach_history = history;
        }
        debug!(
            equity = pool.pool_equity,
            cash = pool.available_cash,
            options_used = pool.options_used,
            "pool status updated"
        );
    }

    pub fn pool_status(&self) -> PoolStatus {
        self.pool.read().clone()
    }

    /// Close a trading day for the theta governor.
    pub fn record_theta_day(&self, breached: bool) -> GovernorState {
        let mut pool = self.pool.write();
        pool.theta_breach_history.push(breached);
        let len = pool.theta_breach_history.len();
        if len > THETA_HISTORY_DAYS {
            pool.theta_breach_history.drain(..len - THETA_HISTORY_DAYS);
        }
        let state = self.governor.evaluate(&pool.theta_breach_history);
        if state.active {
            warn!(breach_days = state.breach_days, "theta governor active");
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::FixedTimeSource;
    use crate::config::DataMode;
    use crate::ledger::{MemoryLedger, TimeRange};
    use crate::models::{
        AssetClass, Bias, ChainRow, OptionChain, OptionKind, Quote, Side, SnapshotKind,
        StructureKind,
    };

    const NOW: Millis = 1_700_000_000_000;

    fn quote(ts: Millis) -> MarketSnapshot {
        MarketSnapshot::Quote(Quote {
            symbol: "SPY".into(),
            bid: 99.95,
            ask: 100.05,
            bid_size: 10.0,
            ask_size: 10.0,
            ts_feed: ts,
            ts_recv: ts,
            source: "opra".into(),
        })
    }

    fn chain(ts: Millis) -> MarketSnapshot {
        let row = |strike: f64| ChainRow {
            strike,
            kind: OptionKind::Call,
            bid: 1.00,
            ask: 1.02,
            volume: 1_000.0,
            open_interest: 2_000.0,
        };
        MarketSnapshot::Chain(OptionChain {
            symbol: "SPY".into(),
            underlying_price: 100.0,
            days_to_expiry: 30,
            rows: vec![row(100.0), row(105.0)],
            ts_feed: ts,
            ts_recv: ts,
            source: "opra".into(),
        })
    }

    fn request() -> PositionRequest {
        PositionRequest {
            symbol: "SPY".into(),
            structure: StructureKind::DebitVertical,
            bias: Bias::Bullish,
            legs: vec![],
            capital: 10_000.0,
            conviction: 0.02,
            expected_move: 0.05,
            iv_rank: 0.5,
            chain_quality: None,
            quote_age_ms: None,
            underlying_price: 100.0,
            spread_pct: 0.05,
            leveraged_etf: false,
            max_friction_pct: 0.20,
            days_to_ex_dividend: None,
            event_signals: vec![],
        }
    }

    fn engine_with(config: SafetyConfig) -> (ProofEngine, Arc<MemoryLedger>, Arc<FixedTimeSource>) {
        let ledger = Arc::new(MemoryLedger::new());
        let time = Arc::new(FixedTimeSource::new(NOW));
        let engine = ProofEngine::new(config, ledger.clone(), time.clone());
        engine.update_pool_status(PoolStatus::new(10_000.0, 10_000.0, 1_000.0));
        (engine, ledger, time)
    }

    #[tokio::test]
    async fn test_size_position_fills_live_inputs_and_records_proof() {
        let (engine, ledger, _) = engine_with(SafetyConfig::default());
        engine.record_snapshot(quote(NOW - 1_000)).await.unwrap();
        engine.record_snapshot(chain(NOW - 1_000)).await.unwrap();

        let result = engine.size_position(request(), true).await.unwrap();
        assert!(result.approved, "rejected: {:?}", result.rejection_reason);

        let entries = ledger.query(None, TimeRange::since(0)).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].payload.kind(), SnapshotKind::Proof);
    }

    fn good_chain_quality() -> ChainQuality {
        ChainQuality {
            overall: 0.8,
            spread_score: 0.9,
            volume_score: 0.7,
            oi_score: 0.7,
        }
    }

    fn wide_quote(ts: Millis) -> MarketSnapshot {
        MarketSnapshot::Quote(Quote {
            symbol: "SPY".into(),
            bid: 95.0,
            ask: 105.0,
            bid_size: 10.0,
            ask_size: 10.0,
            ts_feed: ts,
            ts_recv: ts,
            source: "opra".into(),
        })
    }

    #[tokio::test]
    async fn test_caller_supplied_market_inputs_are_ignored() {
        let (engine, _, _) = engine_with(SafetyConfig::default());
        let mut claimed = request();
        claimed.quote_age_ms = Some(1_000);
        claimed.chain_quality = Some(good_chain_quality());

        let proved = engine.size_position(claimed.clone(), true).await.unwrap();
        assert!(!proved.approved);
        assert!(proved.proof.unwrap().has_code(ErrorCode::DataMissing));

        let fast = engine.size_position(claimed, false).await.unwrap();
        assert!(!fast.approved);
        assert!(fast
            .rejection_reason
            .unwrap()
            .starts_with(ErrorCode::DataMissing.as_str()));
    }

    #[tokio::test]
    async fn test_missing_chain_rejects_despite_supplied_quality() {
        let (engine, _, _) = engine_with(SafetyConfig::default());
        engine.record_snapshot(quote(NOW - 1_000)).await.unwrap();
        let mut claimed = request();
        claimed.chain_quality = Some(good_chain_quality());

        let result = engine.size_position(claimed, true).await.unwrap();
        assert!(!result.approved);
        assert!(result.proof.unwrap().has_code(ErrorCode::DataMissing));
    }

    #[tokio::test]
    async fn test_live_spread_drives_friction() {
        let mut tight_request = request();
        tight_request.spread_pct = 0.0;
        tight_request.max_friction_pct = 0.03;

        let (tight, _, _) = engine_with(SafetyConfig::default());
        tight.record_snapshot(quote(NOW - 1_000)).await.unwrap();
        tight.record_snapshot(chain(NOW - 1_000)).await.unwrap();
        let approved = tight.size_position(tight_request.clone(), false).await.unwrap();
        assert!(approved.approved, "rejected: {:?}", approved.rejection_reason);

        // caller claims a zero spread; the live 10% spread must still count
        let (wide, _, _) = engine_with(SafetyConfig::default());
        wide.record_snapshot(wide_quote(NOW - 1_000)).await.unwrap();
        wide.record_snapshot(chain(NOW - 1_000)).await.unwrap();
        let rejected = wide.size_position(tight_request, false).await.unwrap();
        assert!(!rejected.approved);
        assert!(rejected
            .rejection_reason
            .unwrap()
            .starts_with(ErrorCode::FrictionExceeded.as_str()));
    }

    #[tokio::test]
    async fn test_future_dated_fill_refused() {
        let (engine, ledger, _) = engine_with(SafetyConfig::default());
        let promise = PreTradePromise {
            trade_id: "T-1".into(),
            symbol: "SPY".into(),
            asset_class: AssetClass::Options,
            side: Side::Buy,
            reference_price: 1.50,
            planned_max_slippage_pct: 0.02,
            promised_net_debit: 1.50,
            promised_total_cost: 155.05,
            quantity: 1.0,
            multiplier: 100.0,
            cash_before: 10_000.0,
            pool_equity: 10_000.0,
        };
        let fill = FillReport {
            trade_id: "T-1".into(),
            symbol: "SPY".into(),
            side: Side::Buy,
            price: 1.52,
            quantity: 1.0,
            fees: 1.30,
            timestamp: NOW + 10_000,
            fill_pct: 1.0,
            actual_slippage_pct: 0.0133,
            order_book: None,
        };

        let err = engine.verify_fill(&promise, fill.clone()).await.unwrap_err();
        assert!(err.to_string().starts_with("OUT_OF_ORDER_SNAPSHOT"));
        assert!(ledger.is_empty());

        let mut on_time = fill;
        on_time.timestamp = NOW - 500;
        assert!(engine.verify_fill(&promise, on_time).await.unwrap().passed);
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_quote_rejects_no_data() {
        let (engine, _, _) = engine_with(SafetyConfig::default());
        engine.record_snapshot(chain(NOW - 1_000)).await.unwrap();

        let result = engine.size_position(request(), true).await.unwrap();
        assert!(!result.approved);
        assert!(result.proof.unwrap().has_code(ErrorCode::DataMissing));
    }

    #[tokio::test]
    async fn test_stale_quote_rejects() {
        let (engine, _, time) = engine_with(SafetyConfig::default());
        engine.record_snapshot(quote(NOW - 1_000)).await.unwrap();
        engine.record_snapshot(chain(NOW - 1_000)).await.unwrap();
        time.advance(60_000);

        let result = engine.size_position(request(), true).await.unwrap();
        assert!(!result.approved);
        assert!(result
            .rejection_reason
            .unwrap()
            .contains(ErrorCode::DataStale.as_str()));
    }

    #[tokio::test]
    async fn test_non_real_mode_refuses() {
        let mut config = SafetyConfig::default();
        config.runtime.data_mode = DataMode::Paper;
        let (engine, _, _) = engine_with(config);

        let err = engine.size_position(request(), true).await.unwrap_err();
        assert!(err.to_string().contains("INVALID_DATA_MODE"));
    }

    #[tokio::test]
    async fn test_out_of_order_snapshot_refused() {
        let (engine, ledger, _) = engine_with(SafetyConfig::default());
        let snapshot = MarketSnapshot::Quote(Quote {
            symbol: "SPY".into(),
            bid: 1.0,
            ask: 1.1,
            bid_size: 1.0,
            ask_size: 1.0,
            ts_feed: NOW - 100,
            ts_recv: NOW - 500,
            source: "opra".into(),
        });
        assert!(engine.record_snapshot(snapshot).await.is_err());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_classify_buffers_bounded_signals() {
        let mut config = SafetyConfig::default();
        config.runtime.signal_buffer = 2;
        let (engine, _, _) = engine_with(config);
        let tickers = vec!["AAPL".to_string()];

        for _ in 0..3 {
            engine.classify(
                "Apple beats earnings estimates, raises guidance",
                "reuters",
                &tickers,
            );
        }
        let live = engine.live_signals();
        assert!(!live.is_empty());
        assert!(live.len() <= 2);
        assert!(live.iter().all(|s| !s.validated));
    }

    #[test]
    fn test_theta_governor_trips_after_consecutive_breaches() {
        let (engine, _, _) = engine_with(SafetyConfig::default());
        assert!(!engine.record_theta_day(true).active);
        assert!(engine.record_theta_day(true).active);
        assert!(!engine.record_theta_day(false).active);

        engine.update_pool_status(PoolStatus::new(20_000.0, 15_000.0, 0.0));
        assert_eq!(engine.pool_status().theta_breach_history, vec![true, true, false]);
    }
}
