//! Safety configuration
//!
//! One immutable value handed to every component at construction. Thresholds
//! and the runtime data mode live here and nowhere else.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Runtime data mode. Only `Real` may drive a risk decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DataMode {
    #[default]
    Real,
    Paper,
    Replay,
}

impl DataMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Real => "real",
            Self::Paper => "paper",
            Self::Replay => "replay",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "real" | "live" | "production" => Some(Self::Real),
            "paper" => Some(Self::Paper),
            "replay" | "backtest" => Some(Self::Replay),
            _ => None,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SafetyConfig {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub sizing: SizingConfig,
    #[serde(default)]
    pub proofs: ProofThresholds,
    #[serde(default)]
    pub shock: ShockConfig,
    #[serde(default)]
    pub post_trade: PostTradeConfig,
    #[serde(default)]
    pub temporal: TemporalConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub reaction_stats: ReactionStatsConfig,
}

impl SafetyConfig {
    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;
        Ok(config)
    }

    /// Load from `.env` / environment, falling back to defaults.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let path = std::env::var("RISKPROOF_CONFIG_PATH")
            .unwrap_or_else(|_| "riskproof.toml".to_string());

        let mut config = Self::load(&path).unwrap_or_else(|e| {
            tracing::debug!("Using default safety config ({}): {:#}", path, e);
            Self::default()
        });
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(mode) = std::env::var("RISKPROOF_DATA_MODE") {
            match DataMode::parse(&mode) {
                Some(parsed) => self.runtime.data_mode = parsed,
                None => tracing::warn!(value = %mode, "ignoring unknown RISKPROOF_DATA_MODE"),
            }
        }
        if let Ok(env) = std::env::var("RISKPROOF_ENV") {
            self.runtime.environment = env;
        }
        if let Ok(commit) = std::env::var("RISKPROOF_COMMIT") {
            self.runtime.commit_hash = commit;
        }
    }

    /// Save to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// SHA-256 over the canonical JSON form of every threshold.
    pub fn policy_hash(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        hex::encode(hasher.finalize())
    }
}

/// Process identity and mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub data_mode: DataMode,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_commit_hash")]
    pub commit_hash: String,
    /// Upper bound on a single snapshot fetch before the call is rejected.
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,
    /// Live signals kept for the event-risk proof.
    #[serde(default = "default_signal_buffer")]
    pub signal_buffer: usize,
}

fn default_environment() -> String {
    "production".to_string()
}
fn default_commit_hash() -> String {
    option_env!("RISKPROOF_BUILD_COMMIT")
        .unwrap_or("unknown")
        .to_string()
}
fn default_io_timeout_ms() -> u64 {
    750
}
fn default_signal_buffer() -> usize {
    512
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            data_mode: DataMode::Real,
            environment: default_environment(),
            commit_hash: default_commit_hash(),
            io_timeout_ms: default_io_timeout_ms(),
            signal_buffer: default_signal_buffer(),
        }
    }
}

/// Timestamp ordering and freshness thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_max_out_of_order_ms")]
    pub max_out_of_order_ms: i64,
    #[serde(default = "default_quote_fresh_ms")]
    pub quote_fresh_ms: i64,
    #[serde(default = "default_chain_fresh_ms")]
    pub chain_fresh_ms: i64,
    #[serde(default = "default_order_book_fresh_ms")]
    pub order_book_fresh_ms: i64,
    /// Lower-cased substrings that mark a payload as non-real data.
    #[serde(default = "default_forbidden_markers")]
    pub forbidden_markers: Vec<String>,
}

fn default_max_out_of_order_ms() -> i64 {
    5_000
}
fn default_quote_fresh_ms() -> i64 {
    5_000
}
fn default_chain_fresh_ms() -> i64 {
    5_000
}
fn default_order_book_fresh_ms() -> i64 {
    2_000
}
fn default_forbidden_markers() -> Vec<String> {
    [
        "math.random",
        "random()",
        "rand::",
        "thread_rng",
        "mock",
        "fake",
        "synthetic",
        "simulated",
        "dummy",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_out_of_order_ms: default_max_out_of_order_ms(),
            quote_fresh_ms: default_quote_fresh_ms(),
            chain_fresh_ms: default_chain_fresh_ms(),
            order_book_fresh_ms: default_order_book_fresh_ms(),
            forbidden_markers: default_forbidden_markers(),
        }
    }
}

/// Candidate sizing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Base capital-at-risk per trade before conviction scaling.
    pub base_risk_pct: f64,
    /// Conviction may not exceed this multiple of the expected move.
    pub conviction_ceiling_ratio: f64,
    pub min_chain_overall: f64,
    pub min_chain_spread_score: f64,
    pub min_chain_volume_score: f64,
    pub min_chain_oi_score: f64,
    /// Contract multiplier (shares per contract).
    pub contract_multiplier: f64,
    pub fee_per_contract_leg: f64,
    /// Configured slippage ceiling as a fraction of premium.
    pub max_slippage_pct: f64,
    /// Extra slippage allowance for leveraged ETF underlyings.
    pub leveraged_etf_allowance_pct: f64,
    /// Slippage grows by this fraction per additional contract.
    pub size_impact_per_contract: f64,
    /// Fraction of each Greeks budget usable before rejecting.
    pub reserved_headroom: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            base_risk_pct: 0.007,
            conviction_ceiling_ratio: 0.75,
            min_chain_overall: 0.6,
            min_chain_spread_score: 0.7,
            min_chain_volume_score: 0.5,
            min_chain_oi_score: 0.5,
            contract_multiplier: 100.0,
            fee_per_contract_leg: 0.65,
            max_slippage_pct: 0.05,
            leveraged_etf_allowance_pct: 0.01,
            size_impact_per_contract: 0.10,
            reserved_headroom: 0.85,
        }
    }
}

/// Thresholds for the nine pre-trade invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProofThresholds {
    pub cash_buffer_pct: f64,
    pub options_cap_pct: f64,
    /// Day P&L (fraction of pool) below which the pool is frozen.
    pub pool_freeze_drawdown_pct: f64,
    pub friction_hard_cap: f64,
    pub theta_budget_pct: f64,
    pub delta_budget_pct: f64,
    pub vega_budget_pct: f64,
    pub governor_lookback_days: usize,
    pub governor_breach_days: usize,
    pub ex_dividend_window_days: u32,
    pub assignment_risk_dte: u32,
    pub event_block_min_confidence: f64,
    pub event_block_min_effect: f64,
}

impl Default for ProofThresholds {
    fn default() -> Self {
        Self {
            cash_buffer_pct: 0.05,
            options_cap_pct: 0.25,
            pool_freeze_drawdown_pct: -0.005,
            friction_hard_cap: 0.20,
            theta_budget_pct: 0.0025,
            delta_budget_pct: 0.50,
            vega_budget_pct: 0.005,
            governor_lookback_days: 2,
            governor_breach_days: 2,
            ex_dividend_window_days: 3,
            assignment_risk_dte: 3,
            event_block_min_confidence: 0.6,
            event_block_min_effect: 0.5,
        }
    }
}

/// Stress-test parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShockConfig {
    pub max_premium_risk_pct: f64,
    pub daily_theta_budget_pct: f64,
    pub iv_shock_points: f64,
    pub theta_days: f64,
}

impl Default for ShockConfig {
    fn default() -> Self {
        Self {
            max_premium_risk_pct: 0.02,
            daily_theta_budget_pct: 0.0025,
            iv_shock_points: 10.0,
            theta_days: 1.0,
        }
    }
}

/// Per-asset-class post-trade tolerances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetClassTolerance {
    pub min_fill_pct: f64,
    pub net_debit_abs_tolerance: f64,
    pub net_debit_rel_tolerance: f64,
    pub cost_tolerance_pct: f64,
    pub min_fee_pct: f64,
    pub max_fee_pct: f64,
    pub require_order_book: bool,
    pub min_book_levels: usize,
}

impl AssetClassTolerance {
    pub fn options() -> Self {
        Self {
            min_fill_pct: 0.80,
            net_debit_abs_tolerance: 0.05,
            net_debit_rel_tolerance: 0.0,
            cost_tolerance_pct: 0.02,
            min_fee_pct: 0.0001,
            max_fee_pct: 0.05,
            require_order_book: false,
            min_book_levels: 1,
        }
    }

    pub fn crypto() -> Self {
        Self {
            min_fill_pct: 0.95,
            net_debit_abs_tolerance: 0.01,
            net_debit_rel_tolerance: 0.005,
            cost_tolerance_pct: 0.05,
            min_fee_pct: 0.0001,
            max_fee_pct: 0.005,
            require_order_book: true,
            min_book_levels: 5,
        }
    }
}

/// Post-trade verification parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostTradeConfig {
    pub slippage_tolerance_mult: f64,
    pub order_book_max_age_ms: i64,
    pub cash_buffer_pct: f64,
    pub options: AssetClassTolerance,
    pub crypto: AssetClassTolerance,
}

impl Default for PostTradeConfig {
    fn default() -> Self {
        Self {
            slippage_tolerance_mult: 1.5,
            order_book_max_age_ms: 2_000,
            cash_buffer_pct: 0.05,
            options: AssetClassTolerance::options(),
            crypto: AssetClassTolerance::crypto(),
        }
    }
}

/// Rolling-window compliance thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalConfig {
    pub nbbo_fresh_min_pct: f64,
    pub friction_soft_threshold: f64,
    pub friction_soft_min_pct: f64,
    pub friction_hard_threshold: f64,
    pub slippage_conformance_min_pct: f64,
    pub slippage_tolerance_mult: f64,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            nbbo_fresh_min_pct: 0.95,
            friction_soft_threshold: 0.20,
            friction_soft_min_pct: 0.90,
            friction_hard_threshold: 0.25,
            slippage_conformance_min_pct: 0.95,
            slippage_tolerance_mult: 1.5,
        }
    }
}

/// Headline classifier tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub min_confidence: f64,
    pub ticker_boost: f64,
    pub ideal_length_boost: f64,
    pub ideal_length_min: usize,
    pub ideal_length_max: usize,
    pub urgency_boost: f64,
    pub unknown_source_multiplier: f64,
    pub max_headline_len: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            ticker_boost: 0.05,
            ideal_length_boost: 0.03,
            ideal_length_min: 40,
            ideal_length_max: 140,
            urgency_boost: 0.05,
            unknown_source_multiplier: 0.5,
            max_headline_len: 2_000,
        }
    }
}

/// Offline reaction-statistics gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactionStatsConfig {
    pub min_sample_5m: usize,
    pub min_abs_effect: f64,
    pub recency_days: i64,
    pub epsilon: f64,
    /// How far a price point may sit from the requested instant.
    pub price_match_tolerance_ms: i64,
}

impl Default for ReactionStatsConfig {
    fn default() -> Self {
        Self {
            min_sample_5m: 100,
            min_abs_effect: 0.2,
            recency_days: 365,
            epsilon: 1e-9,
            price_match_tolerance_ms: 120_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_policy() {
        let config = SafetyConfig::default();
        assert_eq!(config.runtime.data_mode, DataMode::Real);
        assert_eq!(config.audit.max_out_of_order_ms, 5_000);
        assert_eq!(config.proofs.options_cap_pct, 0.25);
        assert_eq!(config.shock.max_premium_risk_pct, 0.02);
        assert_eq!(config.post_trade.crypto.min_fill_pct, 0.95);
        assert_eq!(config.classifier.min_confidence, 0.3);
        assert_eq!(config.reaction_stats.min_sample_5m, 100);
    }

    #[test]
    fn test_toml_roundtrip_partial() {
        let parsed: SafetyConfig = toml::from_str(
            r#"
            [runtime]
            data_mode = "paper"
            environment = "staging"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.runtime.data_mode, DataMode::Paper);
        assert_eq!(parsed.runtime.environment, "staging");
        assert_eq!(parsed.audit.quote_fresh_ms, 5_000);
    }

    #[test]
    fn test_policy_hash_tracks_thresholds() {
        let a = SafetyConfig::default();
        let mut b = SafetyConfig::default();
        assert_eq!(a.policy_hash(), b.policy_hash());
        b.proofs.friction_hard_cap = 0.3;
        assert_ne!(a.policy_hash(), b.policy_hash());
        assert_eq!(a.policy_hash().len(), 64);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("riskproof.toml");
        let config = SafetyConfig::default();
        config.save(&path).unwrap();
        let loaded = SafetyConfig::load(&path).unwrap();
        assert_eq!(loaded.policy_hash(), config.policy_hash());
    }
}
