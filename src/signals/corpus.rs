//! Historical news and price corpus consumed by the reaction-stats batch.

use crate::audit::Millis;
use crate::models::Sector;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalEvent {
    pub headline: String,
    pub source: String,
    #[serde(default)]
    pub tickers: Vec<String>,
    pub timestamp: Millis,
    /// Overrides the rule's sector focus when known.
    #[serde(default)]
    pub sector: Option<Sector>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub ts: Millis,
    pub price: f64,
}

#[async_trait::async_trait]
pub trait HistoricalCorpus: Send + Sync {
    async fn events_since(&self, ts: Millis) -> Result<Vec<HistoricalEvent>>;

    /// Price points for `symbol` in `[from, to]`, ascending by time.
    async fn prices(&self, symbol: &str, from: Millis, to: Millis) -> Result<Vec<PricePoint>>;
}

/// File layout read by [`JsonCorpus::load`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusFile {
    #[serde(default)]
    pub events: Vec<HistoricalEvent>,
    #[serde(default)]
    pub prices: HashMap<String, Vec<PricePoint>>,
}

/// Corpus held in memory, loaded from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct JsonCorpus {
    events: Vec<HistoricalEvent>,
    prices: HashMap<String, Vec<PricePoint>>,
}

impl JsonCorpus {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read corpus at {}", path.display()))?;
        let file: CorpusFile = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse corpus at {}", path.display()))?;
        Ok(Self::from_file(file))
    }

    pub fn from_file(file: CorpusFile) -> Self {
        let mut prices: HashMap<String, Vec<PricePoint>> = HashMap::new();
        for (symbol, mut series) in file.prices {
            series.retain(|p| p.price.is_finite() && p.price > 0.0);
            series.sort_by_key(|p| p.ts);
            prices.insert(symbol.to_ascii_uppercase(), series);
        }
        let mut events = file.events;
        events.sort_by_key(|e| e.timestamp);
        Self { events, prices }
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

#[async_trait::async_trait]
impl HistoricalCorpus for JsonCorpus {
    async fn events_since(&self, ts: Millis) -> Result<Vec<HistoricalEvent>> {
        Ok(self
            .events
            .iter()
            .filter(|e| e.timestamp >= ts)
            .cloned()
            .collect())
    }

    async fn prices(&self, symbol: &str, from: Millis, to: Millis) -> Result<Vec<PricePoint>> {
        Ok(self
            .prices
            .get(&symbol.to_ascii_uppercase())
            .map(|series| {
                series
                    .iter()
                    .filter(|p| p.ts >= from && p.ts <= to)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }
}
