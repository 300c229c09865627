pub mod classifier;
pub mod corpus;
pub mod reaction_stats;
pub mod rules;
pub mod stats_store;

pub use classifier::{ClassifierStats, EventClassifier};
pub use corpus::{HistoricalCorpus, HistoricalEvent, JsonCorpus, PricePoint};
pub use reaction_stats::{HorizonStats, ReactionStats, ReactionStatsBuilder, ReactionStatsTable};
pub use stats_store::ReactionStatsStore;
