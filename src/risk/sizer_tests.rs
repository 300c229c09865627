//! Pre-trade scenario suite for the position sizer.

use super::sizer::PositionSizer;
use crate::config::SafetyConfig;
use crate::error::ErrorCode;
use crate::models::{
    Bias, ChainQuality, EventSignal, EventType, LegSide, OptionKind, OptionLeg, PoolStatus,
    PositionRequest, Sector, StructureKind,
};
use crate::proof::ProofKind;
use proptest::prelude::*;

fn scenario_request() -> PositionRequest {
    PositionRequest {
        symbol: "SPY".into(),
        structure: StructureKind::DebitVertical,
        bias: Bias::Bullish,
        legs: vec![],
        capital: 10_000.0,
        conviction: 0.02,
        expected_move: 0.05,
        iv_rank: 0.5,
        chain_quality: Some(ChainQuality {
            overall: 0.8,
            spread_score: 0.9,
            volume_score: 0.7,
            oi_score: 0.7,
        }),
        quote_age_ms: Some(1_000),
        underlying_price: 100.0,
        spread_pct: 0.05,
        leveraged_etf: false,
        max_friction_pct: 0.20,
        days_to_ex_dividend: None,
        event_signals: vec![],
    }
}

/// Pool at 10% of a 25% cap.
fn scenario_pool() -> PoolStatus {
    PoolStatus::new(10_000.0, 10_000.0, 1_000.0)
}

fn sizer() -> PositionSizer {
    PositionSizer::new(&SafetyConfig::default())
}

fn opposing_signal(validated: bool) -> EventSignal {
    EventSignal {
        event_type: EventType::GuidanceCut,
        direction: -1,
        confidence: 0.8,
        tickers: vec!["SPY".into()],
        sector_focus: Sector::Broad,
        source: "reuters".into(),
        timestamp: 0,
        match_strength: 0.7,
        validated,
        effect_z: Some(-0.9),
    }
}

#[test]
fn test_debit_vertical_passes_all_nine() {
    let result = sizer().size(&scenario_request(), true, &scenario_pool());

    assert!(result.approved, "rejected: {:?}", result.rejection_reason);
    let proof = result.proof.as_ref().unwrap();
    assert!(proof.passed);
    assert_eq!(proof.subproofs.len(), 9);
    for kind in ProofKind::PRE_TRADE {
        assert!(proof.get(kind).unwrap().passed, "{:?} failed", kind);
    }

    assert_eq!(result.contracts, 1);
    assert!((result.premium_per_contract - 150.0).abs() < 1e-9);
    assert!((result.fees - 1.30).abs() < 1e-9);
    assert!(result.friction_ratio < 0.05);
    assert!(result.rejection_reason.is_none());
    assert!((result.shock.as_ref().unwrap().worst_case_pnl + 150.0).abs() < 1e-6);
}

#[test]
fn test_credit_vertical_forbidden() {
    let mut request = scenario_request();
    request.structure = StructureKind::CreditVertical;
    let result = sizer().size(&request, true, &scenario_pool());

    assert!(!result.approved);
    assert_eq!(result.contracts, 0);
    let proof = result.proof.as_ref().unwrap();
    let structure = proof.get(ProofKind::Structure).unwrap();
    assert!(!structure.passed);
    assert!(structure.has_code(ErrorCode::ForbiddenStructure));
    assert!(result
        .rejection_reason
        .as_deref()
        .unwrap()
        .contains("FORBIDDEN_STRUCTURE"));
}

#[test]
fn test_stale_quote_rejects_before_cash_math() {
    let mut request = scenario_request();
    request.quote_age_ms = Some(9_000);
    let result = sizer().size(&request, true, &scenario_pool());

    assert!(!result.approved);
    assert_eq!(result.contracts, 0);
    assert_eq!(result.total_cost, 0.0);
    let proof = result.proof.as_ref().unwrap();
    assert!(proof.has_code(ErrorCode::DataStale));
    assert_eq!(proof.subproofs.len(), 1);
    assert!(proof.get(ProofKind::Cash).is_none());
    assert!(proof.get(ProofKind::Caps).is_none());
}

#[test]
fn test_missing_quote_is_data_missing() {
    let mut request = scenario_request();
    request.quote_age_ms = None;
    for proof_mode in [true, false] {
        let result = sizer().size(&request, proof_mode, &scenario_pool());
        assert!(!result.approved);
        assert!(result
            .rejection_reason
            .as_deref()
            .unwrap()
            .starts_with("DATA_MISSING"));
    }
}

#[test]
fn test_all_nine_run_without_short_circuit() {
    let mut request = scenario_request();
    request.structure = StructureKind::ShortPut;
    let mut pool = scenario_pool();
    pool.available_cash = 100.0;
    pool.day_pnl_pct = -0.01;
    pool.theta_breach_history = vec![true, true];

    let result = sizer().size(&request, true, &pool);
    let proof = result.proof.unwrap();
    assert_eq!(proof.subproofs.len(), 9);
    let failed = proof.failed_kinds();
    assert!(failed.contains(&ProofKind::Structure));
    assert!(failed.contains(&ProofKind::Cash));
    assert!(failed.contains(&ProofKind::Caps));
    assert!(failed.contains(&ProofKind::Governor));
    assert!(proof.has_code(ErrorCode::PoolFrozen));
    assert!(proof.has_code(ErrorCode::GovernorActive));
}

#[test]
fn test_cap_exceeded() {
    let mut pool = scenario_pool();
    pool.options_used = 2_450.0;
    let result = sizer().size(&scenario_request(), true, &pool);
    assert!(!result.approved);
    assert!(result.proof.unwrap().has_code(ErrorCode::CapExceeded));
}

#[test]
fn test_conviction_above_ceiling_rejects() {
    let mut request = scenario_request();
    request.conviction = 0.05;
    let fast = sizer().size(&request, false, &scenario_pool());
    assert!(!fast.approved);
    assert!(fast.rejection_reason.unwrap().contains("conviction"));

    let proved = sizer().size(&request, true, &scenario_pool());
    let proof = proved.proof.unwrap();
    assert!(!proof.get(ProofKind::Caps).unwrap().passed);
}

#[test]
fn test_poor_chain_quality_rejects() {
    let mut request = scenario_request();
    request.chain_quality = Some(ChainQuality {
        overall: 0.8,
        spread_score: 0.5,
        volume_score: 0.7,
        oi_score: 0.7,
    });
    let fast = sizer().size(&request, false, &scenario_pool());
    assert!(!fast.approved);
    assert!(fast.rejection_reason.unwrap().contains("chain quality"));
}

#[test]
fn test_non_proof_path_approves_scenario() {
    let result = sizer().size(&scenario_request(), false, &scenario_pool());
    assert!(result.approved);
    assert!(result.proof.is_none());
    assert_eq!(result.contracts, 1);
}

#[test]
fn test_friction_budget_respected() {
    let mut request = scenario_request();
    request.max_friction_pct = 0.02;
    let result = sizer().size(&request, false, &scenario_pool());
    assert!(!result.approved);
    assert!(result
        .rejection_reason
        .unwrap()
        .starts_with("FRICTION_EXCEEDED"));
}

#[test]
fn test_dynamic_slippage_ceiling() {
    let sizer = sizer();
    assert!((sizer.dynamic_slippage_ceiling(0.04, false) - 0.02).abs() < 1e-12);
    assert!((sizer.dynamic_slippage_ceiling(0.04, true) - 0.03).abs() < 1e-12);
    assert!((sizer.dynamic_slippage_ceiling(0.50, true) - 0.05).abs() < 1e-12);
}

#[test]
fn test_large_capital_scales_contracts_and_greeks() {
    let mut request = scenario_request();
    request.capital = 200_000.0;
    request.conviction = 0.03;
    let mut pool = PoolStatus::new(200_000.0, 200_000.0, 0.0);
    pool.day_pnl_pct = 0.0;
    let result = sizer().size(&request, true, &pool);

    // budget = 200000 * 0.007 * 0.8 = 1120 -> 7 contracts at 150
    assert!(result.approved, "rejected: {:?}", result.rejection_reason);
    assert_eq!(result.contracts, 7);
    assert!((result.greeks.delta - 210.0).abs() < 1e-9);
}

#[test]
fn test_validated_opposing_signal_blocks() {
    let mut request = scenario_request();
    request.event_signals = vec![opposing_signal(true)];
    let result = sizer().size(&request, true, &scenario_pool());
    assert!(!result.approved);
    let proof = result.proof.unwrap();
    assert!(proof.has_code(ErrorCode::EventRiskBlocked));
}

#[test]
fn test_unvalidated_signal_only_warns() {
    let mut request = scenario_request();
    request.event_signals = vec![opposing_signal(false)];
    let result = sizer().size(&request, true, &scenario_pool());
    assert!(result.approved);
    assert!(result.warnings.iter().any(|w| w.contains("unvalidated")));
}

#[test]
fn test_short_itm_leg_near_expiry_blocks() {
    let mut request = scenario_request();
    request.legs = vec![
        OptionLeg {
            kind: OptionKind::Call,
            side: LegSide::Long,
            strike: 90.0,
            days_to_expiry: 2,
        },
        OptionLeg {
            kind: OptionKind::Call,
            side: LegSide::Short,
            strike: 95.0,
            days_to_expiry: 2,
        },
    ];
    let result = sizer().size(&request, true, &scenario_pool());
    let proof = result.proof.unwrap();
    let event = proof.get(ProofKind::EventSafety).unwrap();
    assert!(!event.passed);
    assert!(event.reasons[0].contains("assignment"));
}

#[test]
fn test_ex_dividend_blocks_short_premium() {
    let mut request = scenario_request();
    request.structure = StructureKind::CoveredCall;
    request.days_to_ex_dividend = Some(1);
    let result = sizer().size(&request, true, &scenario_pool());
    let proof = result.proof.unwrap();
    assert!(!proof.get(ProofKind::EventSafety).unwrap().passed);
}

fn structure_strategy() -> impl Strategy<Value = StructureKind> {
    prop_oneof![
        Just(StructureKind::CreditVertical),
        Just(StructureKind::ShortCall),
        Just(StructureKind::ShortPut),
        Just(StructureKind::ShortStraddle),
        Just(StructureKind::ShortStrangle),
        Just(StructureKind::IronCondor),
        Just(StructureKind::CoveredCall),
    ]
}

proptest! {
    #[test]
    fn prop_credit_structures_never_pass(
        structure in structure_strategy(),
        capital in 1_000.0f64..1_000_000.0,
        proof_mode in any::<bool>(),
    ) {
        let mut request = scenario_request();
        request.structure = structure;
        request.capital = capital;
        let pool = PoolStatus::new(capital, capital, 0.0);
        let result = sizer().size(&request, proof_mode, &pool);
        prop_assert!(!result.approved);
        prop_assert_eq!(result.contracts, 0);
        prop_assert!(result.rejection_reason.unwrap().contains("FORBIDDEN_STRUCTURE"));
    }

    #[test]
    fn prop_stale_or_missing_quote_fails_closed(
        age in prop::option::of(5_001i64..10_000_000),
        proof_mode in any::<bool>(),
    ) {
        let mut request = scenario_request();
        request.quote_age_ms = age;
        let result = sizer().size(&request, proof_mode, &scenario_pool());
        prop_assert!(!result.approved);
        prop_assert_eq!(result.contracts, 0);
        prop_assert_eq!(result.total_cost, 0.0);
    }
}
