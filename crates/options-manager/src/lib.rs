//! Recommendation lifecycle over options conviction signals.
//!
//! A [`ConvictionEngine`] turns one market snapshot per cycle into signals
//! and key levels, then hands them to the [`RecommendationManager`], which:
//! - Issues the best qualifying signal per recommendation category
//! - Re-targets and re-scores active recommendations every cycle
//! - Exits on stops, final targets, contradictions, structure changes,
//!   composite flips and diverging flow
//!
//! Everything is deterministic and synchronous; identical inputs and
//! configuration give identical recommendations.

pub mod exits;
pub mod history;
pub mod manager;
pub mod monitor;
pub mod service;
pub mod targets;
pub mod types;

pub use history::{HistoryBuffer, LevelSnapshot};
pub use manager::{CycleSnapshot, LifecycleUpdate, RecommendationManager};
pub use monitor::MarketView;
pub use service::{Analysis, ConvictionEngine, CycleInput, CycleReport};
pub use targets::compute_targets;
pub use types::{
    ExitReason, ManagerConfig, Recommendation, RecommendationCategory, RecommendationStatus,
    TargetLevels,
};
