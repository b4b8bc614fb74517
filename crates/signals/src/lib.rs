//! Scoring machinery for the options conviction engine.
//!
//! - [`WeightSelector`]: time-of-day or IV-regime component weights
//! - [`AtrEstimator`]: EMA true range with a percentage-of-price fallback
//! - [`DynamicThresholds`]: configured threshold intent to concrete cutoffs
//! - [`LevelAggregator`]: contract rows to per-strike levels
//! - [`CompositeScorer`]: weighted composite score per strike
//! - [`LevelFinder`]: support, resistance and other key levels
//! - [`SignalGenerator`] and [`StarMapper`]: categorized, star-rated signals

pub mod aggregate;
pub mod atr;
pub mod composite;
pub mod generator;
pub mod levels;
pub mod stars;
pub mod threshold;
pub mod weights;

pub use aggregate::{LevelAggregator, Reduction};
pub use atr::AtrEstimator;
pub use composite::{CompositeScorer, COMPOSITE_COLUMN};
pub use generator::{ratio_score, Bias, SignalCategory, SignalGenerator, SignalRecord, TradingSignals};
pub use levels::{KeyLevels, LevelFinder};
pub use stars::StarMapper;
pub use threshold::{evaluate, percentile, ComparisonMode, DynamicThresholds};
pub use weights::{IvRegime, TimeBucket, WeightSelection, WeightSelector, WeightSource};
