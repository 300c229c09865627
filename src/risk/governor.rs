//! Theta governor: blocks new risk after repeated daily theta-budget breaches.

use crate::config::ProofThresholds;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernorState {
    pub breach_days: usize,
    pub lookback_days: usize,
    pub breach_days_required: usize,
    pub active: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ThetaGovernor {
    lookback_days: usize,
    breach_days_required: usize,
}

impl ThetaGovernor {
    pub fn new(thresholds: &ProofThresholds) -> Self {
        Self {
            lookback_days: thresholds.governor_lookback_days,
            breach_days_required: thresholds.governor_breach_days,
        }
    }

    /// `history` is per trading day, oldest first.
    pub fn evaluate(&self, history: &[bool]) -> GovernorState {
        let start = history.len().saturating_sub(self.lookback_days);
        let breach_days = history[start..].iter().filter(|b| **b).count();
        GovernorState {
            breach_days,
            lookback_days: self.lookback_days,
            breach_days_required: self.breach_days_required,
            active: self.breach_days_required > 0 && breach_days >= self.breach_days_required,
        }
    }
}
