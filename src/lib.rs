//! riskproof
//!
//! Pre-trade and post-trade risk-proof engine: reason-coded verdicts for
//! position sizing, fill verification against the pre-trade promise,
//! trailing-window compliance roll-ups and validated news-event signals.

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod models;
pub mod proof;
pub mod risk;
pub mod signals;

pub use config::SafetyConfig;
pub use engine::ProofEngine;
pub use error::{ErrorCode, ProofError};
