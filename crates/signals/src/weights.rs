//! Component weight selection.
//!
//! Picks the weight set that blends the per-strike metric components into
//! the composite score, either by time of day or by implied-volatility
//! regime, falling back to the built-in midday set.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveTime;
use mspi_core::config::{
    failsafe_weights, DagMethodologies, IvContextParameters, TimeBasedWeights, WeightsConfig,
};
use mspi_core::{AppConfig, SelectionLogic, WeightSet};
use serde::Serialize;

/// Components always present in the composite score.
pub const BASE_COMPONENTS: [&str; 3] = ["dag_custom", "tdpi", "vri"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBucket {
    Morning,
    Midday,
    Final,
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Morning => write!(f, "morning"),
            Self::Midday => write!(f, "midday"),
            Self::Final => write!(f, "final"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IvRegime {
    LowIv,
    HighIv,
}

/// Where the returned weights came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "policy", content = "set", rename_all = "snake_case")]
pub enum WeightSource {
    TimeBased(TimeBucket),
    VolatilityBased(IvRegime),
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeightSelection {
    pub weights: WeightSet,
    pub source: WeightSource,
}

impl WeightSelection {
    /// Weight for `component`, 0.0 when unlisted.
    #[must_use]
    pub fn weight(&self, component: &str) -> f64 {
        self.weights.get(component).copied().unwrap_or(0.0)
    }
}

pub struct WeightSelector {
    weights: WeightsConfig,
    iv_params: IvContextParameters,
    dag: DagMethodologies,
    sum_tolerance: f64,
}

impl WeightSelector {
    #[must_use]
    pub fn new(config: &AppConfig) -> Self {
        Self {
            weights: config.data_processor_settings.weights.clone(),
            iv_params: config.data_processor_settings.iv_context_parameters.clone(),
            dag: config.strategy_settings.dag_methodologies.clone(),
            sum_tolerance: config.validation.weights_sum_tolerance,
        }
    }

    /// Component names the composite score blends: the base components plus
    /// the normalized column of every active SDAG method with a positive
    /// in-score weight.
    #[must_use]
    pub fn components(&self) -> Vec<String> {
        let mut components: Vec<String> = BASE_COMPONENTS.iter().map(|c| (*c).to_string()).collect();
        for method in self.dag.active_methods() {
            if self.dag.settings(method).weight_in_mspi > 0.0 {
                components.push(method.norm_column());
            }
        }
        components
    }

    /// Selects the weight set for `time` (time-based policy) or for the IV
    /// percentile in `iv_context` (volatility-based policy).
    #[must_use]
    pub fn select(&self, time: NaiveTime, iv_context: Option<&HashMap<String, f64>>) -> WeightSelection {
        let chosen = match self.weights.selection_logic {
            SelectionLogic::TimeBased => {
                let bucket = self.time_bucket(time);
                let set = match bucket {
                    TimeBucket::Morning => &self.weights.time_based.morning,
                    TimeBucket::Midday => &self.weights.time_based.midday,
                    TimeBucket::Final => &self.weights.time_based.final_session,
                };
                Some((set, WeightSource::TimeBased(bucket)))
            }
            SelectionLogic::VolatilityBased => self.iv_regime(iv_context).map(|regime| {
                let set = match regime {
                    IvRegime::LowIv => &self.weights.volatility_based.low_iv,
                    IvRegime::HighIv => &self.weights.volatility_based.high_iv,
                };
                (set, WeightSource::VolatilityBased(regime))
            }),
            SelectionLogic::Unknown => {
                tracing::warn!("Unknown weight selection logic, using fallback weights");
                None
            }
        };

        let (set, source) = match chosen {
            Some((set, source)) if is_usable(set) => (set.clone(), source),
            Some((_, source)) => {
                tracing::warn!(source = ?source, "Selected weight set missing or invalid, using fallback weights");
                (fallback_set(), WeightSource::Fallback)
            }
            None => (fallback_set(), WeightSource::Fallback),
        };

        let weights = self.expand(&set);
        let total: f64 = weights.values().sum();
        if (total - 1.0).abs() > self.sum_tolerance {
            tracing::warn!(total, tolerance = self.sum_tolerance, source = ?source, "Component weights do not sum to 1");
        }
        tracing::debug!(source = ?source, ?weights, "Selected component weights");
        WeightSelection { weights, source }
    }

    fn expand(&self, set: &WeightSet) -> WeightSet {
        self.components()
            .into_iter()
            .map(|component| {
                let weight = set
                    .get(&component)
                    .copied()
                    .filter(|w| w.is_finite())
                    .unwrap_or(0.0);
                (component, weight)
            })
            .collect()
    }

    fn time_bucket(&self, time: NaiveTime) -> TimeBucket {
        let defs = &self.weights.time_based_definitions;
        let morning_end = parse_boundary(&defs.morning_end, "morning_end", 11);
        let midday_end = parse_boundary(&defs.midday_end, "midday_end", 14);
        if time < morning_end {
            TimeBucket::Morning
        } else if time < midday_end {
            TimeBucket::Midday
        } else {
            TimeBucket::Final
        }
    }

    fn iv_regime(&self, iv_context: Option<&HashMap<String, f64>>) -> Option<IvRegime> {
        let key = &self.iv_params.iv_percentile;
        let Some(percentile) = iv_context.and_then(|ctx| ctx.get(key)).copied() else {
            tracing::warn!(key = %key, "IV percentile missing from context, using fallback weights");
            return None;
        };
        if !percentile.is_finite() {
            tracing::warn!(key = %key, value = percentile, "IV percentile not finite, using fallback weights");
            return None;
        }
        // Context carries a fraction; the threshold is on a 0-100 scale.
        if percentile * 100.0 < self.weights.volatility_based.iv_percentile_threshold {
            Some(IvRegime::LowIv)
        } else {
            Some(IvRegime::HighIv)
        }
    }
}

fn is_usable(set: &WeightSet) -> bool {
    !set.is_empty() && set.values().all(|w| w.is_finite())
}

fn fallback_set() -> WeightSet {
    let midday = TimeBasedWeights::default().midday;
    if is_usable(&midday) {
        midday
    } else {
        failsafe_weights()
    }
}

fn parse_boundary(raw: &str, name: &str, default_hour: u32) -> NaiveTime {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .unwrap_or_else(|e| {
            tracing::error!(boundary = name, value = raw, error = %e, "Invalid session boundary, using default");
            NaiveTime::from_hms_opt(default_hour, 0, 0).unwrap_or(NaiveTime::MIN)
        })
}
