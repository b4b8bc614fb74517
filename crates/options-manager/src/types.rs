//! Types for recommendation lifecycle management.

use std::fmt;

use chrono::{DateTime, Utc};
use mspi_core::config::{ExitSettings, RecommendationSettings, TargetSettings};
use mspi_core::AppConfig;
use mspi_signals::{Bias, SignalCategory};
use serde::Serialize;

/// What kind of trade idea a recommendation expresses. Each groups one or
/// more signal categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    Directional,
    Volatility,
    PinRisk,
    Caution,
}

impl RecommendationCategory {
    pub const ALL: [Self; 4] = [Self::Directional, Self::Volatility, Self::PinRisk, Self::Caution];

    /// Recommendation category fed by `signal`. SDAG agreement only
    /// modifies directional conviction and never issues on its own.
    #[must_use]
    pub const fn from_signal(signal: SignalCategory) -> Option<Self> {
        match signal {
            SignalCategory::Directional => Some(Self::Directional),
            SignalCategory::VolatilityExpansion | SignalCategory::VolatilityContraction => {
                Some(Self::Volatility)
            }
            SignalCategory::PinRisk | SignalCategory::CharmCascade => Some(Self::PinRisk),
            SignalCategory::StructureChange | SignalCategory::FlowDivergence => Some(Self::Caution),
            SignalCategory::SdagConviction => None,
        }
    }

    #[must_use]
    pub const fn signal_categories(self) -> &'static [SignalCategory] {
        match self {
            Self::Directional => &[SignalCategory::Directional],
            Self::Volatility => &[
                SignalCategory::VolatilityExpansion,
                SignalCategory::VolatilityContraction,
            ],
            Self::PinRisk => &[SignalCategory::PinRisk, SignalCategory::CharmCascade],
            Self::Caution => &[SignalCategory::StructureChange, SignalCategory::FlowDivergence],
        }
    }

    #[must_use]
    pub const fn min_stars(self, settings: &RecommendationSettings) -> u8 {
        match self {
            Self::Directional => settings.min_directional_stars_to_issue,
            Self::Volatility => settings.min_volatility_stars_to_issue,
            Self::PinRisk => settings.min_pinrisk_stars_to_issue,
            Self::Caution => settings.min_caution_stars_to_issue,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Directional => "directional",
            Self::Volatility => "volatility",
            Self::PinRisk => "pin_risk",
            Self::Caution => "caution",
        }
    }
}

impl fmt::Display for RecommendationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    Active,
    Adjusted,
    Exited,
}

/// Why a recommendation left the active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// An opposite-bias signal in the same category group got strong enough.
    Contradiction,
    /// Structure change flagged at the anchor strike.
    StructureInstability,
    /// Composite score at the anchor flipped sign past the configured share
    /// of its entry magnitude.
    CompositeFlip,
    /// Capital flow diverging against the trade at the anchor strike.
    FlowDivergence,
    StopLossHit,
    TargetReached,
    /// Replaced by a newer recommendation in the same category.
    Superseded,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contradiction => write!(f, "contradiction"),
            Self::StructureInstability => write!(f, "structure_instability"),
            Self::CompositeFlip => write!(f, "composite_flip"),
            Self::FlowDivergence => write!(f, "flow_divergence"),
            Self::StopLossHit => write!(f, "stop_loss_hit"),
            Self::TargetReached => write!(f, "target_reached"),
            Self::Superseded => write!(f, "superseded"),
        }
    }
}

/// Stop and target prices around an entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TargetLevels {
    pub stop_loss: f64,
    pub target_1: f64,
    pub target_2: f64,
}

/// A trade recommendation tracked by the manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub id: u64,
    pub symbol: String,
    pub category: RecommendationCategory,
    /// Signal category the recommendation was issued from.
    pub signal_category: SignalCategory,
    /// Trade bias. For volatility recommendations `Bullish` is long volatility.
    pub bias: Bias,
    /// Price direction used for stops and targets. Equals `bias` except for
    /// volatility recommendations, where it follows the entry composite.
    pub direction: Bias,
    pub stars: u8,
    pub conviction_score: f64,
    /// Conviction at issuance; re-scoring without a fresh signal never
    /// exceeds it.
    pub entry_conviction: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub target_1: f64,
    pub target_2: f64,
    /// Strike of the signal that produced the recommendation.
    pub anchor_strike: f64,
    pub entry_composite: f64,
    pub last_composite: f64,
    /// Newest minus oldest composite at the anchor over the history window.
    pub composite_trend: Option<f64>,
    pub issued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: RecommendationStatus,
    pub exit_reason: Option<ExitReason>,
    pub adjustments: u32,
}

impl Recommendation {
    #[must_use]
    pub const fn targets(&self) -> TargetLevels {
        TargetLevels {
            stop_loss: self.stop_loss,
            target_1: self.target_1,
            target_2: self.target_2,
        }
    }

    pub fn apply_targets(&mut self, levels: TargetLevels) {
        self.stop_loss = levels.stop_loss;
        self.target_1 = levels.target_1;
        self.target_2 = levels.target_2;
    }

    /// Seconds elapsed since issuance at `now`.
    #[must_use]
    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.issued_at).num_seconds()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status != RecommendationStatus::Exited
    }
}

/// Manager configuration.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub recommendations: RecommendationSettings,
    pub exits: ExitSettings,
    pub targets: TargetSettings,
    /// Per-symbol snapshot history length.
    pub history_capacity: usize,
}

impl ManagerConfig {
    #[must_use]
    pub fn from_app(config: &AppConfig) -> Self {
        let strategy = &config.strategy_settings;
        Self {
            recommendations: strategy.recommendations.clone(),
            exits: strategy.exits.clone(),
            targets: strategy.targets.clone(),
            history_capacity: config.system_settings.history_capacity(),
        }
    }

    /// Minimum seconds before a category can be re-issued; negative
    /// configuration counts as no cooldown.
    #[must_use]
    pub fn reissue_cooldown_seconds(&self) -> i64 {
        self.recommendations.min_reissue_time_seconds.max(0)
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::from_app(&AppConfig::default())
    }
}
