//! Headline rule table
//!
//! An ordered, static table of event rules. Patterns are compiled once and
//! evaluated in a fixed loop by the classifier.

use crate::models::{EventType, Sector};
use lazy_static::lazy_static;
use regex::Regex;

/// Declarative rule entry.
#[derive(Debug, Clone, Copy)]
pub struct EventRule {
    pub event_type: EventType,
    pub base_confidence: f64,
    pub patterns: &'static [&'static str],
    pub direction: i8,
    pub sector_focus: Sector,
}

/// Rule with its patterns compiled.
#[derive(Debug)]
pub struct CompiledRule {
    pub rule: &'static EventRule,
    pub patterns: Vec<Regex>,
}

pub static RULES: &[EventRule] = &[
    EventRule {
        event_type: EventType::EarningsSurpriseUp,
        base_confidence: 0.75,
        patterns: &[
            r"(?i)\b(beats?|tops?|exceeds?|surpass(?:es)?)\s+(?:\w+\s+){0,3}(?:estimates|expectations|forecasts?|consensus)",
            r"(?i)\b(?:earnings|profit|eps|revenue)\s+(?:beat|surges?|jumps?|soars?)",
            r"(?i)\brecord\s+(?:quarterly\s+)?(?:earnings|profit|revenue)",
        ],
        direction: 1,
        sector_focus: Sector::Broad,
    },
    EventRule {
        event_type: EventType::EarningsSurpriseDown,
        base_confidence: 0.75,
        patterns: &[
            r"(?i)\b(?:miss(?:es)?|falls?\s+short\s+of|below)\s+(?:\w+\s+){0,3}(?:estimates|expectations|forecasts?|consensus)",
            r"(?i)\b(?:earnings|profit|eps|revenue)\s+(?:miss|plunges?|drops?|falls?|slumps?)",
        ],
        direction: -1,
        sector_focus: Sector::Broad,
    },
    EventRule {
        event_type: EventType::GuidanceRaised,
        base_confidence: 0.70,
        patterns: &[
            r"(?i)\b(?:raises?|boosts?|lifts?|ups)\s+(?:\w+\s+){0,3}(?:guidance|outlook|forecast)",
            r"(?i)\b(?:guidance|outlook)\s+(?:raised|increased)",
        ],
        direction: 1,
        sector_focus: Sector::Broad,
    },
    EventRule {
        event_type: EventType::GuidanceCut,
        base_confidence: 0.70,
        patterns: &[
            r"(?i)\b(?:cuts?|lowers?|slashes?|reduces?)\s+(?:\w+\s+){0,3}(?:guidance|outlook|forecast)",
            r"(?i)\b(?:guidance|outlook)\s+(?:cut|lowered|withdrawn)",
            r"(?i)\bwarns?\s+(?:on|of)\s+(?:\w+\s+){0,2}(?:profit|revenue|sales)",
        ],
        direction: -1,
        sector_focus: Sector::Broad,
    },
    EventRule {
        event_type: EventType::AnalystUpgrade,
        base_confidence: 0.55,
        patterns: &[
            r"(?i)\bupgrade[sd]?\s+(?:\w+\s+){0,3}to\s+(?:buy|outperform|overweight)",
            r"(?i)\bupgraded?\b",
        ],
        direction: 1,
        sector_focus: Sector::Broad,
    },
    EventRule {
        event_type: EventType::AnalystDowngrade,
        base_confidence: 0.55,
        patterns: &[
            r"(?i)\bdowngrade[sd]?\s+(?:\w+\s+){0,3}to\s+(?:sell|underperform|underweight|neutral|hold)",
            r"(?i)\bdowngraded?\b",
        ],
        direction: -1,
        sector_focus: Sector::Broad,
    },
    EventRule {
        event_type: EventType::Acquisition,
        base_confidence: 0.70,
        patterns: &[
            r"(?i)\b(?:to\s+acquire|agrees?\s+to\s+buy|acquisition\s+of|takeover\s+(?:bid|offer)|buyout|merger\s+agreement)",
        ],
        direction: 1,
        sector_focus: Sector::Broad,
    },
    EventRule {
        event_type: EventType::RegulatoryApproval,
        base_confidence: 0.70,
        patterns: &[
            r"(?i)\bfda\s+(?:approves?|approval|clears?|grants?)",
            r"(?i)\b(?:receives?|wins?|gains?)\s+(?:\w+\s+){0,2}approval",
        ],
        direction: 1,
        sector_focus: Sector::Healthcare,
    },
    EventRule {
        event_type: EventType::RegulatoryRejection,
        base_confidence: 0.70,
        patterns: &[
            r"(?i)\bfda\s+(?:rejects?|rejection|declines?)",
            r"(?i)\bcomplete\s+response\s+letter",
            r"(?i)\b(?:denied|denies)\s+approval",
        ],
        direction: -1,
        sector_focus: Sector::Healthcare,
    },
    EventRule {
        event_type: EventType::RegulatoryInvestigation,
        base_confidence: 0.60,
        patterns: &[
            r"(?i)\b(?:sec|doj|ftc|justice\s+department)\s+(?:\w+\s+){0,2}(?:probe|investigation|investigates?|subpoena|charges?)",
            r"(?i)\b(?:antitrust|fraud)\s+(?:probe|investigation|lawsuit)",
        ],
        direction: -1,
        sector_focus: Sector::Broad,
    },
    EventRule {
        event_type: EventType::Buyback,
        base_confidence: 0.60,
        patterns: &[
            r"(?i)\b(?:share|stock)\s+(?:buyback|repurchase)",
            r"(?i)\bbuyback\s+(?:program|plan)",
        ],
        direction: 1,
        sector_focus: Sector::Broad,
    },
    EventRule {
        event_type: EventType::DividendRaise,
        base_confidence: 0.60,
        patterns: &[
            r"(?i)\b(?:raises?|increases?|hikes?|boosts?)\s+(?:\w+\s+){0,2}dividend",
            r"(?i)\bspecial\s+dividend",
        ],
        direction: 1,
        sector_focus: Sector::Broad,
    },
    EventRule {
        event_type: EventType::DividendCut,
        base_confidence: 0.65,
        patterns: &[
            r"(?i)\b(?:cuts?|slashes?|suspends?|eliminates?|reduces?)\s+(?:\w+\s+){0,2}dividend",
        ],
        direction: -1,
        sector_focus: Sector::Broad,
    },
    EventRule {
        event_type: EventType::StockOffering,
        base_confidence: 0.55,
        patterns: &[
            r"(?i)\b(?:secondary|public|stock|share)\s+offering",
            r"(?i)\bdilut(?:ion|ive)\b",
        ],
        direction: -1,
        sector_focus: Sector::Broad,
    },
    EventRule {
        event_type: EventType::ExecutiveDeparture,
        base_confidence: 0.50,
        patterns: &[
            r"(?i)\b(?:ceo|cfo|chief\s+executive|chief\s+financial\s+officer)\s+(?:\w+\s+){0,2}(?:resigns?|steps?\s+down|departs?|ousted|fired|exits?)",
        ],
        direction: -1,
        sector_focus: Sector::Broad,
    },
    EventRule {
        event_type: EventType::Bankruptcy,
        base_confidence: 0.85,
        patterns: &[
            r"(?i)\b(?:files?|filed|filing)\s+for\s+(?:chapter\s+(?:11|7)\s+)?bankruptcy",
            r"(?i)\bchapter\s+(?:11|7)\b",
        ],
        direction: -1,
        sector_focus: Sector::Financials,
    },
    EventRule {
        event_type: EventType::ProductRecall,
        base_confidence: 0.60,
        patterns: &[r"(?i)\brecall(?:s|ed|ing)?\b"],
        direction: -1,
        sector_focus: Sector::Consumer,
    },
    EventRule {
        event_type: EventType::SecurityBreach,
        base_confidence: 0.60,
        patterns: &[
            r"(?i)\b(?:data|security)\s+breach",
            r"(?i)\b(?:hacked|cyberattack|ransomware)\b",
        ],
        direction: -1,
        sector_focus: Sector::Technology,
    },
];

/// Words that count toward financial-term density.
pub static FINANCIAL_TERMS: &[&str] = &[
    "earnings", "revenue", "profit", "eps", "guidance", "outlook", "forecast", "estimates",
    "consensus", "quarter", "quarterly", "dividend", "buyback", "repurchase", "shares", "stock",
    "margin", "sales", "analyst", "rating", "upgrade", "downgrade", "acquisition", "merger",
    "offering", "bankruptcy", "debt", "fda", "sec", "approval", "valuation",
];

/// Markers of time-sensitive wire copy.
pub static URGENCY_TERMS: &[&str] = &["breaking", "urgent", "just in", "alert", "flash"];

/// Source credibility tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceTier {
    Tier1,
    Tier2,
    Tier3,
    Unknown,
}

impl SourceTier {
    pub fn classify(source: &str) -> Self {
        let s = source.trim().to_ascii_lowercase();
        const TIER1: &[&str] = &[
            "reuters",
            "bloomberg",
            "wsj",
            "wall street journal",
            "dow jones",
            "associated press",
            "ap news",
            "financial times",
            "ft.com",
            "sec.gov",
            "sec filing",
        ];
        const TIER2: &[&str] = &[
            "cnbc",
            "marketwatch",
            "barrons",
            "barron's",
            "benzinga",
            "yahoo",
            "seeking alpha",
            "seekingalpha",
        ];
        const TIER3: &[&str] = &["twitter", "x.com", "reddit", "stocktwits"];

        if s.is_empty() {
            Self::Unknown
        } else if s == "ap" || s == "ft" || TIER1.iter().any(|t| s.contains(t)) {
            Self::Tier1
        } else if TIER2.iter().any(|t| s.contains(t)) {
            Self::Tier2
        } else if s == "x" || TIER3.iter().any(|t| s.contains(t)) {
            Self::Tier3
        } else {
            Self::Unknown
        }
    }

    /// Confidence multiplier; unknown sources use the configured penalty.
    pub fn multiplier(&self, unknown: f64) -> f64 {
        match self {
            Self::Tier1 => 1.0,
            Self::Tier2 => 0.85,
            Self::Tier3 => 0.6,
            Self::Unknown => unknown,
        }
    }
}

lazy_static! {
    /// Compiled rule table, in table order. Patterns that fail to compile are
    /// dropped with the rest of the rule kept.
    pub static ref COMPILED_RULES: Vec<CompiledRule> = RULES
        .iter()
        .map(|rule| CompiledRule {
            rule,
            patterns: rule
                .patterns
                .iter()
                .filter_map(|p| match Regex::new(p) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        tracing::error!(pattern = %p, error = %e, "invalid rule pattern");
                        None
                    }
                })
                .collect(),
        })
        .collect();
}

/// Tokenize into lower-cased words.
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}
