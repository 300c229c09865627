//! Shock Tester
//!
//! Pure stress test of a proposed options position. Scenarios are linear in
//! the Greeks; convexity is credited only on the favourable price leg so the
//! adverse figures never flatter the position.

use crate::config::ShockConfig;
use crate::models::{Greeks, StructureKind};
use serde::{Deserialize, Serialize};

/// Stress-test verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Approve,
    Review,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    /// Underlying +/- one expected move.
    PriceShock,
    /// Implied volatility +/- the configured points.
    IvShock,
    /// Theta over the configured holding days.
    TimeDecay,
    /// Adverse price, IV down and theta together.
    Combined,
}

/// Outcome of one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShockScenario {
    pub kind: ScenarioKind,
    /// Worst P&L within the scenario.
    pub pnl: f64,
    /// Best P&L within the scenario.
    pub favourable_pnl: f64,
}

/// Position as seen by the stress test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShockPosition {
    pub structure: StructureKind,
    pub contracts: u32,
    /// Total premium paid; bounds the loss of a debit structure.
    pub premium: f64,
    /// Bounded upside, if any.
    pub max_gain: Option<f64>,
    /// Position-level Greeks.
    pub greeks: Greeks,
    pub underlying_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShockTestResult {
    pub worst_case_pnl: f64,
    pub scenarios: Vec<ShockScenario>,
    pub max_loss_allowed: f64,
    pub theta_impact: f64,
    pub theta_budget: f64,
    pub breaches: Vec<String>,
    pub passed: bool,
    pub recommendation: Recommendation,
    pub iv_rank: f64,
}

impl ShockTestResult {
    pub fn scenario(&self, kind: ScenarioKind) -> Option<&ShockScenario> {
        self.scenarios.iter().find(|s| s.kind == kind)
    }
}

#[derive(Debug, Clone)]
pub struct ShockTester {
    config: ShockConfig,
}

impl ShockTester {
    pub fn new(config: ShockConfig) -> Self {
        Self { config }
    }

    /// Run every scenario. Deterministic in its inputs; `iv_rank` is reported
    /// but does not move any scenario.
    pub fn test_position(
        &self,
        position: &ShockPosition,
        account_size: f64,
        expected_move: f64,
        iv_rank: f64,
    ) -> ShockTestResult {
        let g = position.greeks;
        let price_move = position.underlying_price * expected_move.abs();
        let iv_points = self.config.iv_shock_points;

        let bound = |pnl: f64| -> f64 {
            let floored = if position.structure.is_credit() {
                pnl
            } else {
                pnl.max(-position.premium)
            };
            match position.max_gain {
                Some(cap) => floored.min(cap),
                None => floored,
            }
        };

        // Price: adverse leg is linear, favourable leg gets the gamma credit.
        let adverse_price = -g.delta.abs() * price_move;
        let favourable_price = g.delta.abs() * price_move + 0.5 * g.gamma.max(0.0) * price_move * price_move;
        let price = ShockScenario {
            kind: ScenarioKind::PriceShock,
            pnl: bound(adverse_price),
            favourable_pnl: bound(favourable_price),
        };

        let iv_up = g.vega * iv_points;
        let iv_down = -g.vega * iv_points;
        let iv = ShockScenario {
            kind: ScenarioKind::IvShock,
            pnl: bound(iv_up.min(iv_down)),
            favourable_pnl: bound(iv_up.max(iv_down)),
        };

        let decay_pnl = g.theta * self.config.theta_days;
        let decay = ShockScenario {
            kind: ScenarioKind::TimeDecay,
            pnl: bound(decay_pnl),
            favourable_pnl: bound(decay_pnl),
        };

        let combined_pnl = adverse_price + iv_down + decay_pnl;
        let combined = ShockScenario {
            kind: ScenarioKind::Combined,
            pnl: bound(combined_pnl),
            favourable_pnl: bound(combined_pnl),
        };

        let scenarios = vec![price, iv, decay, combined];
        let worst_case_pnl = scenarios
            .iter()
            .flat_map(|s| [s.pnl, s.favourable_pnl])
            .fold(f64::INFINITY, f64::min);

        let max_loss_allowed = account_size * self.config.max_premium_risk_pct;
        let theta_impact = decay_pnl.min(0.0).abs();
        let theta_budget = account_size * self.config.daily_theta_budget_pct;

        let mut breaches = Vec::new();
        if worst_case_pnl.abs() > max_loss_allowed {
            breaches.push(format!(
                "worst-case P&L {:.2} exceeds max premium risk {:.2}",
                worst_case_pnl, max_loss_allowed
            ));
        }
        if theta_impact > theta_budget {
            breaches.push(format!(
                "theta impact {:.2} exceeds daily theta budget {:.2}",
                theta_impact, theta_budget
            ));
        }

        let recommendation = match breaches.len() {
            0 => Recommendation::Approve,
            1 => Recommendation::Review,
            _ => Recommendation::Reject,
        };

        ShockTestResult {
            worst_case_pnl,
            scenarios,
            max_loss_allowed,
            theta_impact,
            theta_budget,
            passed: breaches.is_empty(),
            breaches,
            recommendation,
            iv_rank,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn vertical(contracts: u32) -> ShockPosition {
        let n = contracts as f64;
        ShockPosition {
            structure: StructureKind::DebitVertical,
            contracts,
            premium: 150.0 * n,
            max_gain: Some(350.0 * n),
            greeks: Greeks {
                delta: 30.0,
                gamma: 1.0,
                theta: -1.5,
                vega: 2.25,
            }
            .scaled(n),
            underlying_price: 100.0,
        }
    }

    #[test]
    fn test_single_vertical_approves() {
        let tester = ShockTester::new(ShockConfig::default());
        let result = tester.test_position(&vertical(1), 10_000.0, 0.05, 0.5);

        assert_eq!(result.worst_case_pnl, -150.0);
        assert!(result.passed);
        assert_eq!(result.recommendation, Recommendation::Approve);
        assert_eq!(result.scenarios.len(), 4);
        assert!((result.theta_impact - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_loss_floored_at_premium() {
        let tester = ShockTester::new(ShockConfig::default());
        let result = tester.test_position(&vertical(1), 10_000.0, 0.50, 0.5);
        assert_eq!(result.worst_case_pnl, -150.0);
        let combined = result.scenario(ScenarioKind::Combined).unwrap();
        assert_eq!(combined.pnl, -150.0);
    }

    #[test]
    fn test_one_breach_reviews() {
        let tester = ShockTester::new(ShockConfig::default());
        // 3 contracts: worst -450 > 200, theta 4.5 <= 25
        let result = tester.test_position(&vertical(3), 10_000.0, 0.05, 0.5);
        assert!(!result.passed);
        assert_eq!(result.breaches.len(), 1);
        assert_eq!(result.recommendation, Recommendation::Review);
    }

    #[test]
    fn test_two_breaches_reject() {
        let tester = ShockTester::new(ShockConfig::default());
        let mut position = vertical(3);
        position.greeks.theta = -40.0;
        let result = tester.test_position(&position, 10_000.0, 0.05, 0.5);
        assert_eq!(result.breaches.len(), 2);
        assert_eq!(result.recommendation, Recommendation::Reject);
    }

    #[test]
    fn test_iv_rank_does_not_move_result() {
        let tester = ShockTester::new(ShockConfig::default());
        let a = tester.test_position(&vertical(2), 10_000.0, 0.04, 0.1);
        let b = tester.test_position(&vertical(2), 10_000.0, 0.04, 0.9);
        assert_eq!(a.worst_case_pnl, b.worst_case_pnl);
        assert_eq!(a.recommendation, b.recommendation);
    }

    proptest! {
        #[test]
        fn prop_worst_case_monotone_in_expected_move(
            contracts in 1u32..10,
            m1 in 0.0f64..0.5,
            m2 in 0.0f64..0.5,
        ) {
            let tester = ShockTester::new(ShockConfig::default());
            let position = vertical(contracts);
            let (lo, hi) = if m1 <= m2 { (m1, m2) } else { (m2, m1) };
            let small = tester.test_position(&position, 10_000.0, lo, 0.5);
            let large = tester.test_position(&position, 10_000.0, hi, 0.5);
            prop_assert!(large.worst_case_pnl.abs() >= small.worst_case_pnl.abs());
        }

        #[test]
        fn prop_worst_case_is_min_of_scenarios(contracts in 1u32..10, m in 0.0f64..0.3) {
            let tester = ShockTester::new(ShockConfig::default());
            let result = tester.test_position(&vertical(contracts), 25_000.0, m, 0.5);
            for s in &result.scenarios {
                prop_assert!(result.worst_case_pnl <= s.pnl);
            }
        }
    }
}
