//! Pre-trade and post-trade risk gates.

pub mod governor;
pub mod post_trade;
pub mod shock;
pub mod sizer;
pub mod temporal;

pub use governor::{GovernorState, ThetaGovernor};
pub use post_trade::PostTradeProver;
pub use shock::{
    Recommendation, ScenarioKind, ShockPosition, ShockScenario, ShockTestResult, ShockTester,
};
pub use sizer::{PositionSizer, PositionSizingResult};
pub use temporal::{
    KindCount, TemporalProofAggregator, TemporalVerdict, TemporalWindowSummary, TrailingWindow,
};

#[cfg(test)]
mod sizer_tests;
