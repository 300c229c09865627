//! Proof objects
//!
//! Every invariant check produces a [`ProofResult`] carrying typed metrics for
//! its [`ProofKind`]. Sub-proofs are joined into an [`OverallProof`]: a single
//! failing sub-proof fails the whole.

use crate::error::ErrorCode;
use crate::models::StructureKind;
use crate::risk::shock::Recommendation;
use serde::{Deserialize, Serialize};

/// Closed set of proof categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofKind {
    // Pre-trade
    Structure,
    Cash,
    Caps,
    Friction,
    DataFreshness,
    GreeksBudget,
    ShockSurvivability,
    Governor,
    EventSafety,
    // Post-trade
    ExecutionBounds,
    StructureBounds,
    CashBounds,
    OrderBookDepth,
    SlippageReference,
    FeeCompliance,
}

/// Which gate produced a proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofStage {
    PreTrade,
    PostTrade,
}

impl ProofKind {
    pub const PRE_TRADE: [ProofKind; 9] = [
        ProofKind::Structure,
        ProofKind::Cash,
        ProofKind::Caps,
        ProofKind::Friction,
        ProofKind::DataFreshness,
        ProofKind::GreeksBudget,
        ProofKind::ShockSurvivability,
        ProofKind::Governor,
        ProofKind::EventSafety,
    ];

    pub const POST_TRADE: [ProofKind; 6] = [
        ProofKind::ExecutionBounds,
        ProofKind::StructureBounds,
        ProofKind::CashBounds,
        ProofKind::OrderBookDepth,
        ProofKind::SlippageReference,
        ProofKind::FeeCompliance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structure => "structure",
            Self::Cash => "cash",
            Self::Caps => "caps",
            Self::Friction => "friction",
            Self::DataFreshness => "data_freshness",
            Self::GreeksBudget => "greeks_budget",
            Self::ShockSurvivability => "shock_survivability",
            Self::Governor => "governor",
            Self::EventSafety => "event_safety",
            Self::ExecutionBounds => "execution_bounds",
            Self::StructureBounds => "structure_bounds",
            Self::CashBounds => "cash_bounds",
            Self::OrderBookDepth => "order_book_depth",
            Self::SlippageReference => "slippage_reference",
            Self::FeeCompliance => "fee_compliance",
        }
    }

    pub fn stage(&self) -> ProofStage {
        match self {
            Self::Structure
            | Self::Cash
            | Self::Caps
            | Self::Friction
            | Self::DataFreshness
            | Self::GreeksBudget
            | Self::ShockSurvivability
            | Self::Governor
            | Self::EventSafety => ProofStage::PreTrade,
            Self::ExecutionBounds
            | Self::StructureBounds
            | Self::CashBounds
            | Self::OrderBookDepth
            | Self::SlippageReference
            | Self::FeeCompliance => ProofStage::PostTrade,
        }
    }
}

/// Typed metrics, one variant per [`ProofKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProofMetrics {
    Structure {
        structure: StructureKind,
        allowed: bool,
        net_debit: f64,
    },
    Cash {
        total_cost: f64,
        available_cash: f64,
        buffer: f64,
        spendable: f64,
    },
    Caps {
        options_used_pct_after: f64,
        options_cap_pct: f64,
        day_pnl_pct: f64,
        frozen: bool,
    },
    Friction {
        friction_cost: f64,
        premium: f64,
        friction_ratio: f64,
        hard_cap: f64,
    },
    DataFreshness {
        quote_age_ms: Option<i64>,
        max_age_ms: i64,
    },
    GreeksBudget {
        theta: f64,
        theta_budget: f64,
        delta: f64,
        delta_budget: f64,
        vega: f64,
        vega_budget: f64,
        headroom: f64,
    },
    ShockSurvivability {
        worst_case_pnl: f64,
        max_loss_allowed: f64,
        theta_impact: f64,
        theta_budget: f64,
        recommendation: Recommendation,
    },
    Governor {
        breach_days: usize,
        lookback_days: usize,
        breach_days_required: usize,
    },
    EventSafety {
        days_to_ex_dividend: Option<u32>,
        short_itm_legs: usize,
        blocking_signals: usize,
        unvalidated_signals: usize,
    },
    ExecutionBounds {
        actual_slippage_pct: f64,
        max_slippage_pct: f64,
        fill_pct: f64,
        min_fill_pct: f64,
    },
    StructureBounds {
        promised_net_debit: f64,
        actual_net_debit: f64,
        tolerance: f64,
    },
    CashBounds {
        promised_total_cost: f64,
        actual_total_cost: f64,
        cost_tolerance: f64,
        cash_after: f64,
        cash_floor: f64,
    },
    OrderBookDepth {
        required: bool,
        book_age_ms: Option<i64>,
        bid_levels: usize,
        ask_levels: usize,
        min_levels: usize,
    },
    SlippageReference {
        reference_mid: Option<f64>,
        slippage_pct: f64,
        max_slippage_pct: f64,
        degraded: bool,
    },
    FeeCompliance {
        fee_pct: f64,
        min_fee_pct: f64,
        max_fee_pct: f64,
    },
}

impl ProofMetrics {
    pub fn kind(&self) -> ProofKind {
        match self {
            Self::Structure { .. } => ProofKind::Structure,
            Self::Cash { .. } => ProofKind::Cash,
            Self::Caps { .. } => ProofKind::Caps,
            Self::Friction { .. } => ProofKind::Friction,
            Self::DataFreshness { .. } => ProofKind::DataFreshness,
            Self::GreeksBudget { .. } => ProofKind::GreeksBudget,
            Self::ShockSurvivability { .. } => ProofKind::ShockSurvivability,
            Self::Governor { .. } => ProofKind::Governor,
            Self::EventSafety { .. } => ProofKind::EventSafety,
            Self::ExecutionBounds { .. } => ProofKind::ExecutionBounds,
            Self::StructureBounds { .. } => ProofKind::StructureBounds,
            Self::CashBounds { .. } => ProofKind::CashBounds,
            Self::OrderBookDepth { .. } => ProofKind::OrderBookDepth,
            Self::SlippageReference { .. } => ProofKind::SlippageReference,
            Self::FeeCompliance { .. } => ProofKind::FeeCompliance,
        }
    }
}

/// Outcome of one invariant check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofResult {
    pub passed: bool,
    /// Failure reasons, each prefixed with an [`ErrorCode`].
    pub reasons: Vec<String>,
    /// Soft findings that do not fail the proof.
    #[serde(default)]
    pub warnings: Vec<String>,
    pub metrics: ProofMetrics,
}

impl ProofResult {
    /// Start a passing proof; call [`ProofResult::fail`] to record breaches.
    pub fn new(metrics: ProofMetrics) -> Self {
        Self {
            passed: true,
            reasons: Vec::new(),
            warnings: Vec::new(),
            metrics,
        }
    }

    pub fn kind(&self) -> ProofKind {
        self.metrics.kind()
    }

    pub fn fail(&mut self, code: ErrorCode, message: impl AsRef<str>) {
        self.passed = false;
        self.reasons.push(code.reason(message));
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn has_code(&self, code: ErrorCode) -> bool {
        let prefix = code.as_str();
        self.reasons.iter().any(|r| r.starts_with(prefix))
    }
}

/// Conjunction of sub-proofs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallProof {
    pub passed: bool,
    pub reasons: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub subproofs: Vec<ProofResult>,
}

impl OverallProof {
    pub fn from_subproofs(subproofs: Vec<ProofResult>) -> Self {
        let passed = !subproofs.is_empty() && subproofs.iter().all(|p| p.passed);
        let reasons = subproofs.iter().flat_map(|p| p.reasons.clone()).collect();
        let warnings = subproofs.iter().flat_map(|p| p.warnings.clone()).collect();
        Self {
            passed,
            reasons,
            warnings,
            subproofs,
        }
    }

    /// A verdict reached without running any sub-proof (no data, timeout).
    pub fn rejected(code: ErrorCode, message: impl AsRef<str>) -> Self {
        Self {
            passed: false,
            reasons: vec![code.reason(message)],
            warnings: Vec::new(),
            subproofs: Vec::new(),
        }
    }

    pub fn get(&self, kind: ProofKind) -> Option<&ProofResult> {
        self.subproofs.iter().find(|p| p.kind() == kind)
    }

    pub fn has_code(&self, code: ErrorCode) -> bool {
        let prefix = code.as_str();
        self.reasons.iter().any(|r| r.starts_with(prefix))
    }

    pub fn failed_kinds(&self) -> Vec<ProofKind> {
        self.subproofs
            .iter()
            .filter(|p| !p.passed)
            .map(|p| p.kind())
            .collect()
    }
}
