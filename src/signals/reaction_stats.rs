//! Reaction Statistics Builder
//!
//! Offline batch: joins historical events to prices, classifies them and
//! measures the forward return per (event type, sector) at 5m, 30m and 1d.
//! Only groups that clear the sample-size, effect-size and recency gates are
//! kept; the table is always rebuilt whole.

use super::classifier::EventClassifier;
use super::corpus::{HistoricalCorpus, PricePoint};
use crate::audit::{Millis, MILLIS_PER_DAY};
use crate::config::{ClassifierConfig, ReactionStatsConfig};
use crate::models::{EventType, Sector};
use anyhow::Result;
use metrics::counter;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};
use std::collections::HashMap;
use tracing::{debug, info};

pub const HORIZON_5M_MS: Millis = 5 * 60 * 1_000;
pub const HORIZON_30M_MS: Millis = 30 * 60 * 1_000;
pub const HORIZON_1D_MS: Millis = MILLIS_PER_DAY;

/// Return distribution at one horizon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizonStats {
    pub avg_return: f64,
    pub std_return: f64,
    pub median_return: f64,
    pub skew: f64,
    pub hit_rate: f64,
    pub effect_size: f64,
    pub sample_size: usize,
    pub passes_validation: bool,
}

impl HorizonStats {
    pub fn compute(returns: &[f64], min_samples: usize, min_abs_effect: f64, epsilon: f64) -> Self {
        let n = returns.len();
        if n == 0 {
            return Self {
                avg_return: 0.0,
                std_return: 0.0,
                median_return: 0.0,
                skew: 0.0,
                hit_rate: 0.0,
                effect_size: 0.0,
                sample_size: 0,
                passes_validation: false,
            };
        }

        let mean = returns.iter().mean();
        let std = returns.iter().population_std_dev();
        let median = Data::new(returns.to_vec()).median();
        let skew = if std > epsilon {
            returns.iter().map(|r| ((r - mean) / std).powi(3)).sum::<f64>() / n as f64
        } else {
            0.0
        };
        let hit_rate = returns.iter().filter(|r| **r > 0.0).count() as f64 / n as f64;
        let effect_size = mean / (std + epsilon);

        Self {
            avg_return: mean,
            std_return: std,
            median_return: median,
            skew,
            hit_rate,
            effect_size,
            sample_size: n,
            passes_validation: n >= min_samples && effect_size.abs() >= min_abs_effect,
        }
    }
}

/// Validated statistics for one (event type, sector) group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionStats {
    pub event_type: EventType,
    pub sector: Sector,
    pub m5: HorizonStats,
    pub m30: HorizonStats,
    pub d1: HorizonStats,
    pub latest_sample_ts: Millis,
}

/// Immutable table of validated groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReactionStatsTable {
    pub built_at: Millis,
    pub lookback_days: i64,
    pub min_samples: usize,
    pub groups: Vec<ReactionStats>,
    /// Groups that were measured but failed a gate.
    pub discarded_groups: usize,
}

impl ReactionStatsTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn lookup(&self, event_type: EventType, sector: Sector) -> Option<&ReactionStats> {
        self.groups
            .iter()
            .find(|g| g.event_type == event_type && g.sector == sector)
    }

    /// Strongest validated group for an event type across sectors.
    pub fn strongest(&self, event_type: EventType) -> Option<&ReactionStats> {
        self.groups
            .iter()
            .filter(|g| g.event_type == event_type)
            .max_by(|a, b| {
                a.m5.effect_size
                    .abs()
                    .partial_cmp(&b.m5.effect_size.abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}

/// One event/ticker observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReactionSample {
    pub event_type: EventType,
    pub sector: Sector,
    pub ts: Millis,
    pub r5m: Option<f64>,
    pub r30m: Option<f64>,
    pub r1d: Option<f64>,
}

pub struct ReactionStatsBuilder {
    config: ReactionStatsConfig,
    classifier: EventClassifier,
}

impl ReactionStatsBuilder {
    /// Uses its own classifier so batch runs do not skew live statistics.
    pub fn new(config: ReactionStatsConfig, classifier: ClassifierConfig) -> Self {
        Self {
            config,
            classifier: EventClassifier::new(classifier),
        }
    }

    pub async fn build(
        &self,
        corpus: &dyn HistoricalCorpus,
        lookback_days: i64,
        min_samples: usize,
        now: Millis,
    ) -> Result<ReactionStatsTable> {
        let since = now - lookback_days.max(0) * MILLIS_PER_DAY;
        let events = corpus.events_since(since).await?;
        let tol = self.config.price_match_tolerance_ms;

        let mut samples = Vec::new();
        for event in &events {
            let signals =
                self.classifier
                    .classify(&event.headline, &event.source, &event.tickers, event.timestamp);
            for signal in signals {
                for ticker in &signal.tickers {
                    let prices = corpus
                        .prices(ticker, event.timestamp - tol, event.timestamp + HORIZON_1D_MS + tol)
                        .await?;
                    let Some(base) = price_at_or_before(&prices, event.timestamp, tol) else {
                        debug!(ticker = %ticker, ts = event.timestamp, "no base price for event");
                        continue;
                    };
                    let ret = |h: Millis| {
                        price_near(&prices, event.timestamp + h, tol).map(|p| (p - base) / base)
                    };
                    samples.push(ReactionSample {
                        event_type: signal.event_type,
                        sector: event.sector.unwrap_or(signal.sector_focus),
                        ts: event.timestamp,
                        r5m: ret(HORIZON_5M_MS),
                        r30m: ret(HORIZON_30M_MS),
                        r1d: ret(HORIZON_1D_MS),
                    });
                }
            }
        }

        let table = self.build_from_samples(&samples, lookback_days, min_samples, now);
        counter!("riskproof_stats_rebuilds_total", 1);
        info!(
            events = events.len(),
            samples = samples.len(),
            validated = table.groups.len(),
            discarded = table.discarded_groups,
            "reaction stats rebuilt"
        );
        Ok(table)
    }

    /// Group, measure and gate a set of samples.
    pub fn build_from_samples(
        &self,
        samples: &[ReactionSample],
        lookback_days: i64,
        min_samples: usize,
        now: Millis,
    ) -> ReactionStatsTable {
        let c = &self.config;
        let required_5m = min_samples.max(c.min_sample_5m);
        let recency_floor = now - c.recency_days * MILLIS_PER_DAY;

        let mut groups: HashMap<(EventType, Sector), Vec<&ReactionSample>> = HashMap::new();
        for s in samples {
            groups.entry((s.event_type, s.sector)).or_default().push(s);
        }

        let measured: Vec<(ReactionStats, bool)> = groups
            .into_par_iter()
            .filter(|(_, group)| group.len() >= min_samples)
            .map(|((event_type, sector), group)| {
                let collect = |f: fn(&ReactionSample) -> Option<f64>| -> Vec<f64> {
                    group.iter().filter_map(|s| f(s)).filter(|r| r.is_finite()).collect()
                };
                let m5 = HorizonStats::compute(&collect(|s| s.r5m), min_samples, c.min_abs_effect, c.epsilon);
                let m30 = HorizonStats::compute(&collect(|s| s.r30m), min_samples, c.min_abs_effect, c.epsilon);
                let d1 = HorizonStats::compute(&collect(|s| s.r1d), min_samples, c.min_abs_effect, c.epsilon);
                let latest_sample_ts = group.iter().map(|s| s.ts).max().unwrap_or(Millis::MIN);

                let keep = m5.sample_size >= required_5m
                    && m5.effect_size.abs() >= c.min_abs_effect
                    && latest_sample_ts >= recency_floor;

                (
                    ReactionStats {
                        event_type,
                        sector,
                        m5,
                        m30,
                        d1,
                        latest_sample_ts,
                    },
                    keep,
                )
            })
            .collect();

        let discarded_groups = measured.iter().filter(|(_, keep)| !keep).count();
        let mut kept: Vec<ReactionStats> = measured
            .into_iter()
            .filter_map(|(stats, keep)| keep.then_some(stats))
            .collect();
        kept.sort_by_key(|g| (g.event_type, g.sector));

        ReactionStatsTable {
            built_at: now,
            lookback_days,
            min_samples,
            groups: kept,
            discarded_groups,
        }
    }
}

fn price_at_or_before(prices: &[PricePoint], ts: Millis, tol: Millis) -> Option<f64> {
    prices
        .iter()
        .filter(|p| p.ts <= ts && ts - p.ts <= tol)
        .max_by_key(|p| p.ts)
        .map(|p| p.price)
}

fn price_near(prices: &[PricePoint], ts: Millis, tol: Millis) -> Option<f64> {
    prices
        .iter()
        .filter(|p| (p.ts - ts).abs() <= tol)
        .min_by_key(|p| (p.ts - ts).abs())
        .map(|p| p.price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const NOW: Millis = 1_700_000_000_000;

    fn builder() -> ReactionStatsBuilder {
        ReactionStatsBuilder::new(ReactionStatsConfig::default(), ClassifierConfig::default())
    }

    fn samples(event_type: EventType, n: usize, base: f64, spread: f64, ts: Millis) -> Vec<ReactionSample> {
        (0..n)
            .map(|i| {
                let wiggle = if i % 2 == 0 { spread } else { -spread };
                let r = base + wiggle;
                ReactionSample {
                    event_type,
                    sector: Sector::Broad,
                    ts,
                    r5m: Some(r),
                    r30m: Some(r * 2.0),
                    r1d: Some(r * 3.0),
                }
            })
            .collect()
    }

    #[test]
    fn test_horizon_stats_basic() {
        let stats = HorizonStats::compute(&[0.01, 0.02, 0.03, -0.01], 2, 0.2, 1e-9);
        assert_eq!(stats.sample_size, 4);
        assert!((stats.avg_return - 0.0125).abs() < 1e-12);
        assert!((stats.median_return - 0.015).abs() < 1e-12);
        assert_eq!(stats.hit_rate, 0.75);
        assert!(stats.effect_size > 0.2);
        assert!(stats.passes_validation);
    }

    #[test]
    fn test_strong_large_group_is_kept() {
        let b = builder();
        let data = samples(EventType::EarningsSurpriseUp, 120, 0.01, 0.01, NOW - 1_000);
        let table = b.build_from_samples(&data, 365, 30, NOW);
        assert_eq!(table.groups.len(), 1);
        let g = table.lookup(EventType::EarningsSurpriseUp, Sector::Broad).unwrap();
        assert!((g.m5.effect_size - 1.0).abs() < 1e-6);
        assert_eq!(g.m5.sample_size, 120);
    }

    #[test]
    fn test_small_group_discarded() {
        let data = samples(EventType::GuidanceCut, 99, -0.01, 0.01, NOW);
        let table = builder().build_from_samples(&data, 365, 30, NOW);
        assert!(table.groups.is_empty());
        assert_eq!(table.discarded_groups, 1);
    }

    #[test]
    fn test_weak_effect_discarded() {
        let data = samples(EventType::Buyback, 150, 0.001, 0.02, NOW);
        let table = builder().build_from_samples(&data, 365, 30, NOW);
        assert!(table.groups.is_empty());
    }

    #[test]
    fn test_stale_group_discarded() {
        let data = samples(EventType::Bankruptcy, 150, -0.02, 0.01, NOW - 400 * MILLIS_PER_DAY);
        let table = builder().build_from_samples(&data, 730, 30, NOW);
        assert!(table.groups.is_empty());
    }

    proptest! {
        #[test]
        fn prop_stored_groups_clear_gates(
            n in 1usize..250,
            base in -0.05f64..0.05,
            spread in 0.0f64..0.05,
            min_samples in 1usize..200,
        ) {
            let data = samples(EventType::AnalystUpgrade, n, base, spread, NOW);
            let table = builder().build_from_samples(&data, 365, min_samples, NOW);
            for g in &table.groups {
                prop_assert!(g.m5.sample_size >= 100);
                prop_assert!(g.m5.effect_size.abs() >= 0.2);
            }
        }
    }
}
