//! Event Classifier
//!
//! Rule-based headline scorer. Each rule contributes at most one signal,
//! scored from its strongest pattern match and adjusted for source quality,
//! ticker presence, headline length and urgency. Bad input is logged and
//! skipped; classification never fails.

use super::rules::{words, SourceTier, COMPILED_RULES, FINANCIAL_TERMS, URGENCY_TERMS};
use crate::audit::Millis;
use crate::config::ClassifierConfig;
use crate::models::EventSignal;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Rolling classifier performance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierStats {
    pub headlines_processed: u64,
    pub headlines_with_signals: u64,
    pub signals_emitted: u64,
    pub errors: u64,
    pub detection_rate: f64,
    pub avg_latency_us: f64,
    pub error_rate: f64,
}

#[derive(Debug, Default)]
struct Counters {
    processed: AtomicU64,
    with_signals: AtomicU64,
    emitted: AtomicU64,
    errors: AtomicU64,
    latency_us_total: AtomicU64,
}

pub struct EventClassifier {
    config: ClassifierConfig,
    counters: Counters,
    clock: quanta::Clock,
}

impl std::fmt::Debug for EventClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventClassifier")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Strongest match of one rule.
struct RuleMatch {
    len: usize,
    words: usize,
}

impl EventClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            counters: Counters::default(),
            clock: quanta::Clock::new(),
        }
    }

    pub fn classify(
        &self,
        headline: &str,
        source: &str,
        tickers: &[String],
        timestamp: Millis,
    ) -> Vec<EventSignal> {
        let start = self.clock.raw();
        self.counters.processed.fetch_add(1, Ordering::Relaxed);
        counter!("riskproof_classifier_headlines_total", 1);

        let signals = match self.validate(headline) {
            Ok(text) => self.score(text, source, tickers, timestamp),
            Err(reason) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                warn!(source, reason, "skipping headline");
                Vec::new()
            }
        };

        if !signals.is_empty() {
            self.counters.with_signals.fetch_add(1, Ordering::Relaxed);
            self.counters
                .emitted
                .fetch_add(signals.len() as u64, Ordering::Relaxed);
        }

        let elapsed_us = self.clock.delta(start, self.clock.raw()).as_micros() as u64;
        self.counters
            .latency_us_total
            .fetch_add(elapsed_us, Ordering::Relaxed);
        histogram!("riskproof_classify_latency_us", elapsed_us as f64);

        signals
    }

    pub fn stats(&self) -> ClassifierStats {
        let processed = self.counters.processed.load(Ordering::Relaxed);
        let with_signals = self.counters.with_signals.load(Ordering::Relaxed);
        let errors = self.counters.errors.load(Ordering::Relaxed);
        let latency = self.counters.latency_us_total.load(Ordering::Relaxed);
        let denom = processed.max(1) as f64;
        ClassifierStats {
            headlines_processed: processed,
            headlines_with_signals: with_signals,
            signals_emitted: self.counters.emitted.load(Ordering::Relaxed),
            errors,
            detection_rate: with_signals as f64 / denom,
            avg_latency_us: latency as f64 / denom,
            error_rate: errors as f64 / denom,
        }
    }

    fn validate<'a>(&self, headline: &'a str) -> Result<&'a str, &'static str> {
        let text = headline.trim();
        if text.is_empty() {
            return Err("empty headline");
        }
        if text.chars().count() > self.config.max_headline_len {
            return Err("headline exceeds maximum length");
        }
        if text.chars().all(|c| !c.is_alphanumeric()) {
            return Err("headline has no words");
        }
        Ok(text)
    }

    fn score(
        &self,
        text: &str,
        source: &str,
        tickers: &[String],
        timestamp: Millis,
    ) -> Vec<EventSignal> {
        let c = &self.config;
        let tokens = words(text);
        let total_words = tokens.len().max(1) as f64;
        let total_chars = text.chars().count().max(1) as f64;
        let fin_terms = tokens
            .iter()
            .filter(|w| FINANCIAL_TERMS.contains(&w.as_str()))
            .count() as f64;
        let fin_density = fin_terms / total_words;

        let tickers = normalize_tickers(text, tickers);
        let lower = text.to_lowercase();
        let urgent = URGENCY_TERMS.iter().any(|u| lower.contains(u));
        let ideal_length = (c.ideal_length_min..=c.ideal_length_max)
            .contains(&text.chars().count());
        let tier = SourceTier::classify(source);
        let source_mult = tier.multiplier(c.unknown_source_multiplier);

        let mut signals = Vec::new();
        for compiled in COMPILED_RULES.iter() {
            let Some(best) = strongest_match(&compiled.patterns, text) else {
                continue;
            };

            let len_ratio = best.len as f64 / total_chars;
            let kw_density = best.words as f64 / total_words;
            let strength = 0.4 * (3.0 * len_ratio).min(1.0)
                + 0.3 * (5.0 * kw_density).min(1.0)
                + 0.3 * (5.0 * fin_density).min(1.0);

            let mut confidence =
                compiled.rule.base_confidence * (0.6 + 0.4 * strength) * source_mult;
            if !tickers.is_empty() {
                confidence += c.ticker_boost;
            }
            if ideal_length {
                confidence += c.ideal_length_boost;
            }
            if urgent {
                confidence += c.urgency_boost;
            }
            let confidence = confidence.clamp(0.0, 1.0);

            if confidence < c.min_confidence {
                debug!(
                    event_type = compiled.rule.event_type.as_str(),
                    confidence, "match below confidence floor"
                );
                continue;
            }

            signals.push(EventSignal {
                event_type: compiled.rule.event_type,
                direction: compiled.rule.direction,
                confidence,
                tickers: tickers.clone(),
                sector_focus: compiled.rule.sector_focus,
                source: source.to_string(),
                timestamp,
                match_strength: strength,
                validated: false,
                effect_z: None,
            });
        }
        signals
    }
}

fn strongest_match(patterns: &[regex::Regex], text: &str) -> Option<RuleMatch> {
    patterns
        .iter()
        .filter_map(|re| re.find(text))
        .map(|m| RuleMatch {
            len: m.as_str().chars().count(),
            words: words(m.as_str()).len(),
        })
        .max_by_key(|m| m.len)
}

/// Caller tickers plus `$CASHTAG`s found in the text, upper-cased, deduplicated.
fn normalize_tickers(text: &str, tickers: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let cashtags = text.split_whitespace().filter_map(|w| {
        let tag = w.strip_prefix('$')?;
        let tag: String = tag.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
        (!tag.is_empty() && tag.len() <= 6).then_some(tag)
    });
    for t in tickers.iter().map(|t| t.trim().to_string()).chain(cashtags) {
        let t = t.to_ascii_uppercase();
        if !t.is_empty() && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}
