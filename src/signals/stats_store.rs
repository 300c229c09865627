//! Atomically swappable reaction-statistics table.
//!
//! Readers load the current table without locking; a rebuild publishes a new
//! table in one store, so a classify call sees either the old table or the
//! new one, never a partial build.

use super::reaction_stats::{ReactionStats, ReactionStatsTable};
use crate::models::EventSignal;
use arc_swap::ArcSwap;
use std::sync::Arc;

pub struct ReactionStatsStore {
    table: ArcSwap<ReactionStatsTable>,
}

impl Default for ReactionStatsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReactionStatsStore {
    pub fn new() -> Self {
        Self {
            table: ArcSwap::new(Arc::new(ReactionStatsTable::empty())),
        }
    }

    pub fn current(&self) -> Arc<ReactionStatsTable> {
        self.table.load_full()
    }

    /// Publish a freshly built table, returning the previous one.
    pub fn swap(&self, table: ReactionStatsTable) -> Arc<ReactionStatsTable> {
        self.table.swap(Arc::new(table))
    }

    /// Mark signals backed by validated statistics.
    ///
    /// The exact (event type, sector) group wins; otherwise the strongest
    /// group for the event type is used. Signals with no backing group are
    /// left unvalidated.
    pub fn annotate(&self, signals: &mut [EventSignal]) {
        let table = self.table.load();
        for signal in signals.iter_mut() {
            let stats: Option<&ReactionStats> = table
                .lookup(signal.event_type, signal.sector_focus)
                .or_else(|| table.strongest(signal.event_type));
            match stats {
                Some(s) => {
                    signal.validated = true;
                    signal.effect_z = Some(s.m5.effect_size);
                }
                None => {
                    signal.validated = false;
                    signal.effect_z = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventType, Sector};
    use crate::signals::reaction_stats::HorizonStats;

    fn horizon(effect: f64) -> HorizonStats {
        HorizonStats {
            avg_return: 0.01,
            std_return: 0.01,
            median_return: 0.01,
            skew: 0.0,
            hit_rate: 0.7,
            effect_size: effect,
            sample_size: 150,
            passes_validation: true,
        }
    }

    fn signal(event_type: EventType, sector: Sector) -> EventSignal {
        EventSignal {
            event_type,
            direction: 1,
            confidence: 0.8,
            tickers: vec!["AAPL".into()],
            sector_focus: sector,
            source: "reuters".into(),
            timestamp: 0,
            match_strength: 0.5,
            validated: false,
            effect_z: None,
        }
    }

    #[test]
    fn test_annotate_uses_current_table() {
        let store = ReactionStatsStore::new();
        let mut signals = vec![signal(EventType::EarningsSurpriseUp, Sector::Technology)];
        store.annotate(&mut signals);
        assert!(!signals[0].validated);

        store.swap(ReactionStatsTable {
            built_at: 1,
            lookback_days: 365,
            min_samples: 30,
            groups: vec![ReactionStats {
                event_type: EventType::EarningsSurpriseUp,
                sector: Sector::Broad,
                m5: horizon(0.8),
                m30: horizon(0.6),
                d1: horizon(0.4),
                latest_sample_ts: 1,
            }],
            discarded_groups: 0,
        });

        store.annotate(&mut signals);
        assert!(signals[0].validated);
        assert_eq!(signals[0].effect_z, Some(0.8));
        assert_eq!(store.current().built_at, 1);
    }
}
