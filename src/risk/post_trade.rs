//! Post-Trade Prover
//!
//! Re-verifies an executed fill against what the pre-trade gate promised.
//! Six independent checks; every one runs and the verdict is their
//! conjunction.

use crate::config::{AssetClassTolerance, PostTradeConfig};
use crate::error::ErrorCode;
use crate::ledger::FillRecord;
use crate::models::{AssetClass, FillReport, PreTradePromise, Side};
use crate::proof::{OverallProof, ProofMetrics, ProofResult};
use metrics::counter;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct PostTradeProver {
    config: PostTradeConfig,
}

impl PostTradeProver {
    pub fn new(config: PostTradeConfig) -> Self {
        Self { config }
    }

    fn tolerance(&self, asset_class: AssetClass) -> &AssetClassTolerance {
        match asset_class {
            AssetClass::Options => &self.config.options,
            AssetClass::Crypto => &self.config.crypto,
        }
    }

    fn max_slippage(&self, promise: &PreTradePromise) -> f64 {
        promise.planned_max_slippage_pct * self.config.slippage_tolerance_mult
    }

    pub fn verify(&self, promise: &PreTradePromise, fill: &FillReport) -> OverallProof {
        let overall = OverallProof::from_subproofs(vec![
            self.check_execution_bounds(promise, fill),
            self.check_structure_bounds(promise, fill),
            self.check_cash_bounds(promise, fill),
            self.check_order_book_depth(promise, fill),
            self.check_slippage_reference(promise, fill),
            self.check_fee_compliance(promise, fill),
        ]);

        let verdict = if overall.passed { "passed" } else { "failed" };
        counter!("riskproof_verify_total", 1, "verdict" => verdict);
        if overall.passed {
            info!(trade_id = %fill.trade_id, symbol = %fill.symbol, "fill verified");
        } else {
            warn!(
                trade_id = %fill.trade_id,
                symbol = %fill.symbol,
                failed = ?overall.failed_kinds(),
                "fill failed verification"
            );
        }
        overall
    }

    /// Ledger record of a verified fill.
    pub fn fill_record(
        &self,
        promise: &PreTradePromise,
        fill: &FillReport,
        proof: &OverallProof,
    ) -> FillRecord {
        let slippage_pct = proof
            .subproofs
            .iter()
            .find_map(|p| match p.metrics {
                ProofMetrics::SlippageReference { slippage_pct, .. } => Some(slippage_pct),
                _ => None,
            })
            .unwrap_or(fill.actual_slippage_pct);
        let premium = notional(promise, fill);
        let friction_pct = if premium > 0.0 {
            (fill.fees + slippage_pct.max(0.0) * premium) / premium
        } else {
            f64::INFINITY
        };

        FillRecord {
            trade_id: fill.trade_id.clone(),
            symbol: fill.symbol.clone(),
            asset_class: promise.asset_class,
            fill_price: fill.price,
            quantity: fill.quantity,
            fees: fill.fees,
            premium,
            friction_pct,
            slippage_pct,
            planned_max_slippage_pct: promise.planned_max_slippage_pct,
            passed: proof.passed,
            failed_kinds: proof.failed_kinds(),
        }
    }

    // ===== Checks =====

    fn check_execution_bounds(&self, promise: &PreTradePromise, fill: &FillReport) -> ProofResult {
        let tol = self.tolerance(promise.asset_class);
        let max_slippage_pct = self.max_slippage(promise);
        let mut proof = ProofResult::new(ProofMetrics::ExecutionBounds {
            actual_slippage_pct: fill.actual_slippage_pct,
            max_slippage_pct,
            fill_pct: fill.fill_pct,
            min_fill_pct: tol.min_fill_pct,
        });

        if fill.trade_id != promise.trade_id || !fill.symbol.eq_ignore_ascii_case(&promise.symbol) {
            proof.fail(
                ErrorCode::FillQualityInsufficient,
                format!(
                    "fill {} / {} does not match promise {} / {}",
                    fill.trade_id, fill.symbol, promise.trade_id, promise.symbol
                ),
            );
        }
        if fill.side != promise.side {
            proof.fail(
                ErrorCode::FillQualityInsufficient,
                format!("fill side {:?} differs from promised {:?}", fill.side, promise.side),
            );
        }
        if !(fill.actual_slippage_pct <= max_slippage_pct) {
            proof.fail(
                ErrorCode::SlippageExceeded,
                format!(
                    "slippage {:.3}% exceeds {:.3}% ({}x planned)",
                    fill.actual_slippage_pct * 100.0,
                    max_slippage_pct * 100.0,
                    self.config.slippage_tolerance_mult
                ),
            );
        }
        if !(fill.fill_pct >= tol.min_fill_pct) {
            proof.fail(
                ErrorCode::FillQualityInsufficient,
                format!(
                    "filled {:.1}% below {} minimum {:.1}%",
                    fill.fill_pct * 100.0,
                    promise.asset_class.as_str(),
                    tol.min_fill_pct * 100.0
                ),
            );
        }
        proof
    }

    fn check_structure_bounds(&self, promise: &PreTradePromise, fill: &FillReport) -> ProofResult {
        let tol = self.tolerance(promise.asset_class);
        let actual_net_debit = signed_debit(fill.side, fill.price);
        let tolerance = tol
            .net_debit_abs_tolerance
            .max(tol.net_debit_rel_tolerance * promise.promised_net_debit.abs());

        let mut proof = ProofResult::new(ProofMetrics::StructureBounds {
            promised_net_debit: promise.promised_net_debit,
            actual_net_debit,
            tolerance,
        });

        // cash-only policy: any realized credit is forbidden
        if !(actual_net_debit > 0.0) {
            proof.fail(
                ErrorCode::ForbiddenStructure,
                format!(
                    "fill produced a net credit ({:.4}); promised net debit {:.4}",
                    actual_net_debit, promise.promised_net_debit
                ),
            );
        } else if !((actual_net_debit - promise.promised_net_debit).abs() <= tolerance) {
            proof.fail(
                ErrorCode::FillQualityInsufficient,
                format!(
                    "net debit {:.4} differs from promised {:.4} by more than {:.4}",
                    actual_net_debit, promise.promised_net_debit, tolerance
                ),
            );
        }
        proof
    }

    fn check_cash_bounds(&self, promise: &PreTradePromise, fill: &FillReport) -> ProofResult {
        let tol = self.tolerance(promise.asset_class);

        let actual_total_cost =
            signed_debit(fill.side, fill.price) * fill.quantity * promise.multiplier + fill.fees;
        // Partial fills are held to a prorated promise.
        let filled_fraction = if promise.quantity > 0.0 {
            fill.quantity / promise.quantity
        } else {
            0.0
        };
        let promised_total_cost = promise.promised_total_cost * filled_fraction;
        let cost_tolerance = promised_total_cost.abs() * tol.cost_tolerance_pct;
        let cash_after = promise.cash_before - actual_total_cost;
        let cash_floor = promise.pool_equity * self.config.cash_buffer_pct;

        let mut proof = ProofResult::new(ProofMetrics::CashBounds {
            promised_total_cost,
            actual_total_cost,
            cost_tolerance,
            cash_after,
            cash_floor,
        });

        if !(actual_total_cost - promised_total_cost <= cost_tolerance) {
            proof.fail(
                ErrorCode::InsufficientCash,
                format!(
                    "total cost {:.2} overruns promised {:.2} by more than {:.2}",
                    actual_total_cost, promised_total_cost, cost_tolerance
                ),
            );
        }
        if !(cash_after >= cash_floor) {
            proof.fail(
                ErrorCode::InsufficientCash,
                format!(
                    "post-trade cash {:.2} below buffer {:.2}",
                    cash_after, cash_floor
                ),
            );
        }
        proof
    }

    fn check_order_book_depth(&self, promise: &PreTradePromise, fill: &FillReport) -> ProofResult {
        let tol = self.tolerance(promise.asset_class);
        let required = tol.require_order_book;
        let max_age = self.config.order_book_max_age_ms;

        let book = fill.order_book.as_ref();
        let book_age_ms = book.map(|b| (fill.timestamp - b.ts_feed).abs());
        let bid_levels = book.map_or(0, |b| b.bids.len());
        let ask_levels = book.map_or(0, |b| b.asks.len());

        let mut proof = ProofResult::new(ProofMetrics::OrderBookDepth {
            required,
            book_age_ms,
            bid_levels,
            ask_levels,
            min_levels: tol.min_book_levels,
        });

        let mut problems = Vec::new();
        match book_age_ms {
            None => problems.push("no order book at fill time".to_string()),
            Some(age) if age > max_age => problems.push(format!(
                "order book {}ms from fill, max {}ms",
                age, max_age
            )),
            Some(_) => {
                if bid_levels < tol.min_book_levels || ask_levels < tol.min_book_levels {
                    problems.push(format!(
                        "order book depth {}x{} below {} levels per side",
                        bid_levels, ask_levels, tol.min_book_levels
                    ));
                }
            }
        }

        for problem in problems {
            if required {
                proof.fail(ErrorCode::OrderBookUnavailable, problem);
            } else {
                proof.warn(format!("{}; depth not verified", problem));
            }
        }
        proof
    }

    fn check_slippage_reference(&self, promise: &PreTradePromise, fill: &FillReport) -> ProofResult {
        let max_slippage_pct = self.max_slippage(promise);
        let reference_mid = fill
            .order_book
            .as_ref()
            .filter(|b| (fill.timestamp - b.ts_feed).abs() <= self.config.order_book_max_age_ms)
            .and_then(|b| b.mid());

        let (slippage_pct, degraded) = match reference_mid {
            Some(mid) => {
                let adverse = match fill.side {
                    Side::Buy => fill.price - mid,
                    Side::Sell => mid - fill.price,
                };
                (adverse / mid, false)
            }
            None => (fill.actual_slippage_pct, true),
        };

        let mut proof = ProofResult::new(ProofMetrics::SlippageReference {
            reference_mid,
            slippage_pct,
            max_slippage_pct,
            degraded,
        });
        if degraded {
            proof.warn("no fresh mid at fill time; using reported slippage (degraded)");
        }
        if !(slippage_pct <= max_slippage_pct) {
            proof.fail(
                ErrorCode::SlippageExceeded,
                format!(
                    "slippage vs {} {:.3}% exceeds {:.3}%",
                    if degraded { "reported" } else { "mid" },
                    slippage_pct * 100.0,
                    max_slippage_pct * 100.0
                ),
            );
        }
        proof
    }

    fn check_fee_compliance(&self, promise: &PreTradePromise, fill: &FillReport) -> ProofResult {
        let tol = self.tolerance(promise.asset_class);
        let notional = notional(promise, fill);
        let fee_pct = if notional > 0.0 {
            fill.fees / notional
        } else {
            f64::INFINITY
        };

        let mut proof = ProofResult::new(ProofMetrics::FeeCompliance {
            fee_pct,
            min_fee_pct: tol.min_fee_pct,
            max_fee_pct: tol.max_fee_pct,
        });
        if !(fee_pct >= tol.min_fee_pct && fee_pct <= tol.max_fee_pct) {
            proof.fail(
                ErrorCode::FeeAnomalous,
                format!(
                    "fees {:.4}% of notional outside [{:.4}%, {:.4}%]",
                    fee_pct * 100.0,
                    tol.min_fee_pct * 100.0,
                    tol.max_fee_pct * 100.0
                ),
            );
        }
        proof
    }
}

/// Positive when cash is paid.
fn signed_debit(side: Side, price: f64) -> f64 {
    match side {
        Side::Buy => price,
        Side::Sell => -price,
    }
}

fn notional(promise: &PreTradePromise, fill: &FillReport) -> f64 {
    (fill.price * fill.quantity * promise.multiplier).abs()
}
