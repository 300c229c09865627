//! Position Sizer
//!
//! Central pre-trade gate. Produces a candidate size from a conservative
//! capital-risk budget, then proves it against nine independent invariants.
//! Missing or stale market data rejects before any cash or cap math.

use super::governor::ThetaGovernor;
use super::shock::{ShockPosition, ShockTestResult, ShockTester};
use crate::config::{AuditConfig, ProofThresholds, SafetyConfig, SizingConfig};
use crate::error::ErrorCode;
use crate::models::{
    Bias, Greeks, LegSide, PoolStatus, PositionRequest, StructureKind,
};
use crate::proof::{OverallProof, ProofMetrics, ProofResult};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// =============================================================================
// STRUCTURE ESTIMATES
// =============================================================================

/// Fraction of (multiplier x underlying x expected move) paid as premium.
fn premium_factor(structure: StructureKind) -> f64 {
    match structure {
        StructureKind::DebitVertical => 0.3,
        StructureKind::LongCall | StructureKind::LongPut => 0.6,
        StructureKind::Diagonal => 0.5,
        _ => 0.5,
    }
}

/// Minimum premium per contract.
fn premium_floor(structure: StructureKind) -> f64 {
    match structure {
        StructureKind::LongCall | StructureKind::LongPut => 50.0,
        StructureKind::DebitVertical => 25.0,
        StructureKind::Diagonal => 40.0,
        _ => 25.0,
    }
}

/// Per-contract Greeks as a function of the per-contract premium.
fn per_contract_greeks(structure: StructureKind, bias: Bias, premium: f64) -> Greeks {
    let sign = match bias {
        Bias::Bearish => -1.0,
        _ => 1.0,
    };
    match structure {
        StructureKind::DebitVertical => Greeks {
            delta: 30.0 * sign,
            gamma: 1.0,
            theta: -premium * 0.01,
            vega: premium * 0.015,
        },
        StructureKind::LongCall | StructureKind::LongPut => Greeks {
            delta: 50.0 * sign,
            gamma: 2.0,
            theta: -premium * 0.015,
            vega: premium * 0.04,
        },
        StructureKind::Diagonal => Greeks {
            delta: 20.0 * sign,
            gamma: 0.5,
            theta: -premium * 0.005,
            vega: premium * 0.05,
        },
        // Credit structures never size; estimate as short premium for diagnostics.
        _ => Greeks {
            delta: -20.0 * sign,
            gamma: -1.0,
            theta: premium * 0.01,
            vega: -premium * 0.03,
        },
    }
}

// =============================================================================
// RESULT
// =============================================================================

/// Outcome of a sizing call. Size fields are zero whenever `approved` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSizingResult {
    pub symbol: String,
    pub structure: StructureKind,
    pub approved: bool,
    pub contracts: u32,
    pub premium_per_contract: f64,
    pub total_premium: f64,
    pub fees: f64,
    pub slippage_cost: f64,
    pub total_cost: f64,
    pub friction_ratio: f64,
    pub breakeven: f64,
    pub max_loss: f64,
    /// `None` when upside is unbounded.
    pub max_gain: Option<f64>,
    pub greeks: Greeks,
    #[serde(default)]
    pub shock: Option<ShockTestResult>,
    /// Present in proof mode.
    #[serde(default)]
    pub proof: Option<OverallProof>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl PositionSizingResult {
    fn rejected(request: &PositionRequest, reasons: &[String], proof: Option<OverallProof>) -> Self {
        Self {
            symbol: request.symbol.clone(),
            structure: request.structure,
            approved: false,
            contracts: 0,
            premium_per_contract: 0.0,
            total_premium: 0.0,
            fees: 0.0,
            slippage_cost: 0.0,
            total_cost: 0.0,
            friction_ratio: 0.0,
            breakeven: 0.0,
            max_loss: 0.0,
            max_gain: None,
            greeks: Greeks::default(),
            shock: None,
            proof,
            rejection_reason: Some(if reasons.is_empty() {
                ErrorCode::DataMissing.reason("rejected without a recorded reason")
            } else {
                reasons.join("; ")
            }),
            warnings: Vec::new(),
        }
    }

    /// "Rejected, no data": used when a snapshot fetch fails or times out.
    pub fn no_data(request: &PositionRequest, code: ErrorCode, message: &str) -> Self {
        let overall = OverallProof::rejected(code, message);
        let reasons = overall.reasons.clone();
        Self::rejected(request, &reasons, Some(overall))
    }
}

/// Candidate size before any proof runs.
#[derive(Debug, Clone, PartialEq)]
struct Candidate {
    contracts: u32,
    premium_per_contract: f64,
    total_premium: f64,
    fees: f64,
    slippage_cost: f64,
    total_cost: f64,
    friction_ratio: f64,
    breakeven: f64,
    max_loss: f64,
    max_gain: Option<f64>,
    greeks: Greeks,
}

// =============================================================================
// SIZER
// =============================================================================

#[derive(Debug, Clone)]
pub struct PositionSizer {
    sizing: SizingConfig,
    thresholds: ProofThresholds,
    audit: AuditConfig,
    shock: ShockTester,
    governor: ThetaGovernor,
}

impl PositionSizer {
    pub fn new(config: &SafetyConfig) -> Self {
        Self {
            sizing: config.sizing.clone(),
            thresholds: config.proofs.clone(),
            audit: config.audit.clone(),
            shock: ShockTester::new(config.shock.clone()),
            governor: ThetaGovernor::new(&config.proofs),
        }
    }

    /// Size a request. In proof mode every invariant runs and the verdict is
    /// their conjunction; otherwise the first failing gate rejects.
    pub fn size(
        &self,
        request: &PositionRequest,
        proof_mode: bool,
        pool: &PoolStatus,
    ) -> PositionSizingResult {
        let result = if proof_mode {
            self.size_with_proofs(request, pool)
        } else {
            self.size_fast(request)
        };

        let verdict = if result.approved { "approved" } else { "rejected" };
        counter!("riskproof_sizing_total", 1, "verdict" => verdict);
        if result.approved {
            info!(
                symbol = %request.symbol,
                structure = request.structure.as_str(),
                contracts = result.contracts,
                total_cost = result.total_cost,
                proof_mode,
                "position approved"
            );
        } else {
            warn!(
                symbol = %request.symbol,
                structure = request.structure.as_str(),
                proof_mode,
                reason = result.rejection_reason.as_deref().unwrap_or(""),
                "position rejected"
            );
        }
        result
    }

    fn size_fast(&self, request: &PositionRequest) -> PositionSizingResult {
        let freshness = self.check_data_freshness(request);
        if !freshness.passed {
            return PositionSizingResult::rejected(request, &freshness.reasons, None);
        }

        let mut gates = Vec::new();
        if let Some(reason) = self.structure_violation(request) {
            gates.push(reason);
        }
        if let Some(reason) = self.chain_quality_violation(request) {
            gates.push(reason);
        }
        if let Some(reason) = self.conviction_violation(request) {
            gates.push(reason);
        }
        if let Some(reason) = gates.into_iter().next() {
            return PositionSizingResult::rejected(request, &[reason], None);
        }

        let candidate = self.candidate(request);

        let friction_budget = request.max_friction_pct.min(self.thresholds.friction_hard_cap);
        if candidate.friction_ratio > friction_budget {
            let reason = ErrorCode::FrictionExceeded.reason(format!(
                "friction {:.2}% exceeds budget {:.2}%",
                candidate.friction_ratio * 100.0,
                friction_budget * 100.0
            ));
            return PositionSizingResult::rejected(request, &[reason], None);
        }

        let greeks = self.check_greeks(request, &candidate);
        if !greeks.passed {
            return PositionSizingResult::rejected(request, &greeks.reasons, None);
        }

        self.approved(request, candidate, None, None, greeks.warnings)
    }

    fn size_with_proofs(&self, request: &PositionRequest, pool: &PoolStatus) -> PositionSizingResult {
        let freshness = self.check_data_freshness(request);
        if !freshness.passed {
            let overall = OverallProof::from_subproofs(vec![freshness]);
            let reasons = overall.reasons.clone();
            return PositionSizingResult::rejected(request, &reasons, Some(overall));
        }

        let candidate = self.candidate(request);
        let shock = self.shock.test_position(
            &self.shock_position(request, &candidate),
            request.capital,
            request.expected_move,
            request.iv_rank,
        );

        let subproofs = vec![
            self.check_structure(request, &candidate),
            self.check_cash(pool, &candidate),
            self.check_caps(request, pool, &candidate),
            self.check_friction(request, &candidate),
            freshness,
            self.check_greeks(request, &candidate),
            self.check_shock(&shock),
            self.check_governor(pool),
            self.check_event_safety(request),
        ];
        let overall = OverallProof::from_subproofs(subproofs);

        debug!(
            symbol = %request.symbol,
            passed = overall.passed,
            failed = ?overall.failed_kinds(),
            "pre-trade proof evaluated"
        );

        if overall.passed {
            let warnings = overall.warnings.clone();
            self.approved(request, candidate, Some(shock), Some(overall), warnings)
        } else {
            let reasons = overall.reasons.clone();
            let mut result = PositionSizingResult::rejected(request, &reasons, Some(overall));
            result.shock = Some(shock);
            result
        }
    }

    fn approved(
        &self,
        request: &PositionRequest,
        c: Candidate,
        shock: Option<ShockTestResult>,
        proof: Option<OverallProof>,
        warnings: Vec<String>,
    ) -> PositionSizingResult {
        PositionSizingResult {
            symbol: request.symbol.clone(),
            structure: request.structure,
            approved: true,
            contracts: c.contracts,
            premium_per_contract: c.premium_per_contract,
            total_premium: c.total_premium,
            fees: c.fees,
            slippage_cost: c.slippage_cost,
            total_cost: c.total_cost,
            friction_ratio: c.friction_ratio,
            breakeven: c.breakeven,
            max_loss: c.max_loss,
            max_gain: c.max_gain,
            greeks: c.greeks,
            shock,
            proof,
            rejection_reason: None,
            warnings,
        }
    }

    // ===== Candidate sizing =====

    fn conviction_ceiling(&self, request: &PositionRequest) -> f64 {
        request.expected_move.abs() * self.sizing.conviction_ceiling_ratio
    }

    /// Slippage ceiling: `min(configured max, spread/2 + leveraged allowance)`.
    pub fn dynamic_slippage_ceiling(&self, spread_pct: f64, leveraged_etf: bool) -> f64 {
        let allowance = if leveraged_etf {
            self.sizing.leveraged_etf_allowance_pct
        } else {
            0.0
        };
        self.sizing
            .max_slippage_pct
            .min(spread_pct.max(0.0) / 2.0 + allowance)
    }

    fn candidate(&self, request: &PositionRequest) -> Candidate {
        let s = &self.sizing;
        let structure = request.structure;
        let multiplier = s.contract_multiplier;

        let premium_per_contract = premium_floor(structure).max(
            multiplier * request.underlying_price * request.expected_move.abs() * premium_factor(structure),
        );

        let ceiling = self.conviction_ceiling(request);
        let conviction_scale = if ceiling > 0.0 {
            (request.conviction / ceiling).clamp(0.25, 1.0)
        } else {
            0.25
        };
        let budget = request.capital.max(0.0) * s.base_risk_pct * conviction_scale;
        let contracts = ((budget / premium_per_contract).floor() as u32).max(1);
        let n = contracts as f64;

        let total_premium = premium_per_contract * n;
        let fees = s.fee_per_contract_leg * structure.leg_count() as f64 * n;

        let ceiling = self.dynamic_slippage_ceiling(request.spread_pct, request.leveraged_etf);
        let size_impact = 1.0 + s.size_impact_per_contract * (n - 1.0);
        let slippage_pct = (request.spread_pct.max(0.0) / 2.0 * size_impact).min(ceiling);
        let slippage_cost = total_premium * slippage_pct;

        let total_cost = total_premium + fees + slippage_cost;
        let friction_ratio = if total_premium > 0.0 {
            (fees + slippage_cost) / total_premium
        } else {
            f64::INFINITY
        };

        let bias = request.effective_bias();
        let greeks = per_contract_greeks(structure, bias, premium_per_contract).scaled(n);

        let premium_per_share = premium_per_contract / multiplier;
        let anchor = request
            .legs
            .iter()
            .find(|l| l.side == LegSide::Long)
            .map(|l| l.strike)
            .unwrap_or(request.underlying_price);
        let breakeven = match bias {
            Bias::Bearish => anchor - premium_per_share,
            _ => anchor + premium_per_share,
        };

        let max_gain = match structure {
            StructureKind::DebitVertical => {
                let f = premium_factor(structure);
                Some(total_premium * (1.0 - f) / f)
            }
            StructureKind::LongPut => Some(((anchor - premium_per_share) * multiplier * n).max(0.0)),
            _ => None,
        };

        Candidate {
            contracts,
            premium_per_contract,
            total_premium,
            fees,
            slippage_cost,
            total_cost,
            friction_ratio,
            breakeven,
            max_loss: total_premium + fees,
            max_gain,
            greeks,
        }
    }

    fn shock_position(&self, request: &PositionRequest, c: &Candidate) -> ShockPosition {
        ShockPosition {
            structure: request.structure,
            contracts: c.contracts,
            premium: c.total_premium,
            max_gain: c.max_gain,
            greeks: c.greeks,
            underlying_price: request.underlying_price,
        }
    }

    // ===== Gate helpers shared by both paths =====

    fn structure_violation(&self, request: &PositionRequest) -> Option<String> {
        let structure = request.structure;
        if structure.is_credit() || !structure.is_allowed() {
            return Some(ErrorCode::ForbiddenStructure.reason(format!(
                "{} is not in the allowed set (long call/put, debit vertical, diagonal)",
                structure.as_str()
            )));
        }
        let shorts = request.legs.iter().filter(|l| l.side == LegSide::Short).count();
        let longs = request.legs.len() - shorts;
        if shorts > longs {
            return Some(ErrorCode::ForbiddenStructure.reason(format!(
                "{} short legs against {} long legs",
                shorts, longs
            )));
        }
        None
    }

    fn chain_quality_violation(&self, request: &PositionRequest) -> Option<String> {
        let s = &self.sizing;
        let Some(q) = request.chain_quality else {
            return Some(ErrorCode::DataMissing.reason("chain quality metrics unavailable"));
        };
        let mut failures = Vec::new();
        if q.overall <= s.min_chain_overall {
            failures.push(format!("overall {:.2} <= {:.2}", q.overall, s.min_chain_overall));
        }
        if q.spread_score <= s.min_chain_spread_score {
            failures.push(format!("spread {:.2} <= {:.2}", q.spread_score, s.min_chain_spread_score));
        }
        if q.volume_score <= s.min_chain_volume_score {
            failures.push(format!("volume {:.2} <= {:.2}", q.volume_score, s.min_chain_volume_score));
        }
        if q.oi_score <= s.min_chain_oi_score {
            failures.push(format!("open interest {:.2} <= {:.2}", q.oi_score, s.min_chain_oi_score));
        }
        if failures.is_empty() {
            None
        } else {
            Some(ErrorCode::FrictionExceeded.reason(format!(
                "chain quality insufficient: {}",
                failures.join(", ")
            )))
        }
    }

    fn conviction_violation(&self, request: &PositionRequest) -> Option<String> {
        let ceiling = self.conviction_ceiling(request);
        if request.conviction > ceiling {
            Some(ErrorCode::CapExceeded.reason(format!(
                "conviction {:.4} exceeds expected-move ceiling {:.4}",
                request.conviction, ceiling
            )))
        } else {
            None
        }
    }

    // ===== The nine invariants =====

    fn check_structure(&self, request: &PositionRequest, c: &Candidate) -> ProofResult {
        let structure = request.structure;
        let mut proof = ProofResult::new(ProofMetrics::Structure {
            structure,
            allowed: structure.is_allowed() && !structure.is_credit(),
            net_debit: c.premium_per_contract,
        });
        if let Some(reason) = self.structure_violation(request) {
            proof.passed = false;
            proof.reasons.push(reason);
        }
        if !(c.premium_per_contract > 0.0) {
            proof.fail(
                ErrorCode::ForbiddenStructure,
                format!("net debit {:.2} is not strictly positive", c.premium_per_contract),
            );
        }
        proof
    }

    fn check_cash(&self, pool: &PoolStatus, c: &Candidate) -> ProofResult {
        let buffer = pool.pool_equity.max(0.0) * self.thresholds.cash_buffer_pct;
        let spendable = pool.available_cash - buffer;
        let mut proof = ProofResult::new(ProofMetrics::Cash {
            total_cost: c.total_cost,
            available_cash: pool.available_cash,
            buffer,
            spendable,
        });
        if !(c.total_cost <= spendable) {
            proof.fail(
                ErrorCode::InsufficientCash,
                format!(
                    "total cost {:.2} exceeds available cash {:.2} less buffer {:.2}",
                    c.total_cost, pool.available_cash, buffer
                ),
            );
        }
        proof
    }

    fn check_caps(&self, request: &PositionRequest, pool: &PoolStatus, c: &Candidate) -> ProofResult {
        let t = &self.thresholds;
        let used_after = if pool.pool_equity > 0.0 {
            (pool.options_used + c.total_cost) / pool.pool_equity
        } else {
            f64::INFINITY
        };
        let frozen = pool.day_pnl_pct < t.pool_freeze_drawdown_pct;

        let mut proof = ProofResult::new(ProofMetrics::Caps {
            options_used_pct_after: used_after,
            options_cap_pct: t.options_cap_pct,
            day_pnl_pct: pool.day_pnl_pct,
            frozen,
        });
        if !(used_after <= t.options_cap_pct) {
            proof.fail(
                ErrorCode::CapExceeded,
                format!(
                    "options usage {:.2}% would exceed cap {:.2}%",
                    used_after * 100.0,
                    t.options_cap_pct * 100.0
                ),
            );
        }
        if frozen {
            proof.fail(
                ErrorCode::PoolFrozen,
                format!(
                    "day P&L {:.2}% below freeze threshold {:.2}%",
                    pool.day_pnl_pct * 100.0,
                    t.pool_freeze_drawdown_pct * 100.0
                ),
            );
        }
        if let Some(reason) = self.conviction_violation(request) {
            proof.passed = false;
            proof.reasons.push(reason);
        }
        proof
    }

    fn check_friction(&self, request: &PositionRequest, c: &Candidate) -> ProofResult {
        let hard_cap = request.max_friction_pct.min(self.thresholds.friction_hard_cap);
        let mut proof = ProofResult::new(ProofMetrics::Friction {
            friction_cost: c.fees + c.slippage_cost,
            premium: c.total_premium,
            friction_ratio: c.friction_ratio,
            hard_cap,
        });
        if !(c.friction_ratio <= hard_cap) {
            proof.fail(
                ErrorCode::FrictionExceeded,
                format!(
                    "friction {:.2}% exceeds hard cap {:.2}%",
                    c.friction_ratio * 100.0,
                    hard_cap * 100.0
                ),
            );
        }
        if let Some(reason) = self.chain_quality_violation(request) {
            proof.passed = false;
            proof.reasons.push(reason);
        }
        proof
    }

    fn check_data_freshness(&self, request: &PositionRequest) -> ProofResult {
        let max_age_ms = self.audit.quote_fresh_ms;
        let mut proof = ProofResult::new(ProofMetrics::DataFreshness {
            quote_age_ms: request.quote_age_ms,
            max_age_ms,
        });
        match request.quote_age_ms {
            None => proof.fail(ErrorCode::DataMissing, "no NBBO quote available"),
            Some(age) if age < 0 => proof.fail(
                ErrorCode::OutOfOrderSnapshot,
                format!("NBBO quote age {}ms is negative", age),
            ),
            Some(age) if age > max_age_ms => proof.fail(
                ErrorCode::DataStale,
                format!("NBBO quote is {}ms old, max {}ms", age, max_age_ms),
            ),
            Some(_) => {}
        }
        proof
    }

    fn check_greeks(&self, request: &PositionRequest, c: &Candidate) -> ProofResult {
        let t = &self.thresholds;
        let headroom = self.sizing.reserved_headroom;
        let capital = request.capital.max(0.0);

        let theta_budget = capital * t.theta_budget_pct * headroom;
        let delta_budget = capital * t.delta_budget_pct * headroom;
        let vega_budget = capital * t.vega_budget_pct * headroom;

        let theta = c.greeks.theta.abs();
        // Dollar delta: share-equivalents times the underlying price.
        let delta = c.greeks.delta.abs() * request.underlying_price;
        let vega = c.greeks.vega.abs();

        let mut proof = ProofResult::new(ProofMetrics::GreeksBudget {
            theta,
            theta_budget,
            delta,
            delta_budget,
            vega,
            vega_budget,
            headroom,
        });
        if !(theta <= theta_budget) {
            proof.fail(
                ErrorCode::GreeksBudgetExceeded,
                format!("theta {:.2}/day exceeds budget {:.2}", theta, theta_budget),
            );
        }
        if !(delta <= delta_budget) {
            proof.fail(
                ErrorCode::GreeksBudgetExceeded,
                format!("dollar delta {:.2} exceeds budget {:.2}", delta, delta_budget),
            );
        }
        if !(vega <= vega_budget) {
            proof.warn(format!("vega {:.2} exceeds soft budget {:.2}", vega, vega_budget));
        }
        proof
    }

    fn check_shock(&self, shock: &ShockTestResult) -> ProofResult {
        let mut proof = ProofResult::new(ProofMetrics::ShockSurvivability {
            worst_case_pnl: shock.worst_case_pnl,
            max_loss_allowed: shock.max_loss_allowed,
            theta_impact: shock.theta_impact,
            theta_budget: shock.theta_budget,
            recommendation: shock.recommendation,
        });
        for breach in &shock.breaches {
            proof.fail(ErrorCode::ShockTestFailed, breach);
        }
        proof
    }

    fn check_governor(&self, pool: &PoolStatus) -> ProofResult {
        let state = self.governor.evaluate(&pool.theta_breach_history);
        let mut proof = ProofResult::new(ProofMetrics::Governor {
            breach_days: state.breach_days,
            lookback_days: state.lookback_days,
            breach_days_required: state.breach_days_required,
        });
        if state.active {
            proof.fail(
                ErrorCode::GovernorActive,
                format!(
                    "theta budget breached on {} of the last {} trading days",
                    state.breach_days, state.lookback_days
                ),
            );
        }
        proof
    }

    fn check_event_safety(&self, request: &PositionRequest) -> ProofResult {
        let t = &self.thresholds;

        let short_itm_legs = request
            .legs
            .iter()
            .filter(|l| l.side == LegSide::Short)
            .filter(|l| l.days_to_expiry <= t.assignment_risk_dte)
            .filter(|l| l.is_itm(request.underlying_price))
            .count();

        let bias = request.effective_bias().sign();
        let relevant: Vec<_> = request
            .event_signals
            .iter()
            .filter(|s| s.mentions(&request.symbol))
            .collect();
        let blocking: Vec<_> = relevant
            .iter()
            .filter(|s| s.validated)
            .filter(|s| bias != 0 && s.direction == -bias)
            .filter(|s| s.confidence >= t.event_block_min_confidence)
            .filter(|s| s.effect_z.map_or(false, |z| z.abs() >= t.event_block_min_effect))
            .collect();
        let unvalidated_signals = relevant.iter().filter(|s| !s.validated).count();

        let mut proof = ProofResult::new(ProofMetrics::EventSafety {
            days_to_ex_dividend: request.days_to_ex_dividend,
            short_itm_legs,
            blocking_signals: blocking.len(),
            unvalidated_signals,
        });

        if let Some(days) = request.days_to_ex_dividend {
            if request.structure.is_short_premium() && days <= t.ex_dividend_window_days {
                proof.fail(
                    ErrorCode::EventRiskBlocked,
                    format!(
                        "short-option structure {} with ex-dividend in {} days",
                        request.structure.as_str(),
                        days
                    ),
                );
            }
        }
        if short_itm_legs > 0 {
            proof.fail(
                ErrorCode::EventRiskBlocked,
                format!(
                    "{} short leg(s) in-the-money within {} days of expiry (assignment risk)",
                    short_itm_legs, t.assignment_risk_dte
                ),
            );
        }
        for signal in &blocking {
            proof.fail(
                ErrorCode::EventRiskBlocked,
                format!(
                    "validated {} signal opposes position (confidence {:.2}, effect {:.2})",
                    signal.event_type.as_str(),
                    signal.confidence,
                    signal.effect_z.unwrap_or_default()
                ),
            );
        }
        if unvalidated_signals > 0 {
            proof.warn(format!(
                "{} unvalidated event signal(s) for {} ignored",
                unvalidated_signals, request.symbol
            ));
        }
        proof
    }
}
