//! Dynamic thresholds.
//!
//! A [`ThresholdSpec`] states intent ("the 15th percentile", "1.5x the
//! mean"); [`evaluate`] turns it into a concrete cutoff from live data and
//! [`DynamicThresholds::resolve`] layers the configured fallback on top.
//! A `None` result means the threshold is undecidable for this cycle.

use std::collections::BTreeMap;

use mspi_core::config::StrategySettings;
use mspi_core::{AppConfig, ThresholdSpec, ThresholdValue};

/// How data is compared against a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComparisonMode {
    /// Compare raw values.
    #[default]
    Raw,
    /// Compare magnitudes; mean-factor thresholds use the mean of |x|.
    Absolute,
}

/// Evaluates `spec` against `data` without any fallback.
///
/// Non-finite data points are ignored. Returns `None` when the series has
/// no usable points or the computed value is not finite.
#[must_use]
pub fn evaluate(spec: &ThresholdSpec, data: &[f64], mode: ComparisonMode) -> Option<ThresholdValue> {
    let value = match spec {
        ThresholdSpec::Fixed { value, tiers, .. } => match (value, tiers) {
            (Some(v), _) => ThresholdValue::Scalar(*v),
            (None, Some(tiers)) => ThresholdValue::Tiers(tiers.clone()),
            (None, None) => return None,
        },
        ThresholdSpec::RelativePercentile { percentile: p, .. } => {
            let mut cleaned = clean(data);
            cleaned.sort_by(f64::total_cmp);
            ThresholdValue::Scalar(percentile(&cleaned, *p)?)
        }
        ThresholdSpec::RelativeMeanFactor { factor, .. } => {
            let cleaned = clean(data);
            if cleaned.is_empty() {
                return None;
            }
            let sum: f64 = match mode {
                ComparisonMode::Absolute => cleaned.iter().map(|v| v.abs()).sum(),
                ComparisonMode::Raw => cleaned.iter().sum(),
            };
            ThresholdValue::Scalar(sum / cleaned.len() as f64 * factor)
        }
    };
    value.is_finite().then_some(value)
}

fn clean(data: &[f64]) -> Vec<f64> {
    data.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Linear-interpolated percentile of an ascending `sorted` slice. `p` is
/// clamped to [0, 100].
#[must_use]
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || p.is_nan() {
        return None;
    }
    let rank = p.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(frac.mul_add(sorted[hi] - sorted[lo], sorted[lo]))
}

/// Named threshold specs from configuration, with the built-in spec of the
/// same name standing in for a missing or dropped entry.
#[derive(Debug, Clone)]
pub struct DynamicThresholds {
    configured: BTreeMap<String, ThresholdSpec>,
    builtin: BTreeMap<String, ThresholdSpec>,
}

impl DynamicThresholds {
    #[must_use]
    pub fn new(config: &AppConfig) -> Self {
        Self {
            configured: config.strategy_settings.thresholds.clone(),
            builtin: StrategySettings::default().thresholds,
        }
    }

    #[must_use]
    pub fn spec(&self, name: &str) -> Option<&ThresholdSpec> {
        self.configured.get(name).or_else(|| {
            let builtin = self.builtin.get(name);
            if builtin.is_some() {
                tracing::warn!(threshold = name, "Threshold not configured, using built-in spec");
            }
            builtin
        })
    }

    /// Resolves the named threshold against `data`, substituting the spec's
    /// `fallback_value` when live evaluation fails.
    #[must_use]
    pub fn resolve(&self, name: &str, data: &[f64], mode: ComparisonMode) -> Option<ThresholdValue> {
        let Some(spec) = self.spec(name) else {
            tracing::error!(threshold = name, "No threshold spec configured");
            return None;
        };
        if let Some(value) = evaluate(spec, data, mode) {
            tracing::debug!(threshold = name, kind = spec.kind(), ?value, "Resolved threshold");
            return Some(value);
        }
        match spec.fallback_value() {
            Some(fallback) if fallback.is_finite() => {
                tracing::warn!(
                    threshold = name,
                    kind = spec.kind(),
                    points = data.len(),
                    fallback = ?fallback,
                    "Threshold not computable from data, using fallback"
                );
                Some(fallback.clone())
            }
            _ => {
                tracing::error!(
                    threshold = name,
                    kind = spec.kind(),
                    points = data.len(),
                    "Threshold not computable and no usable fallback"
                );
                None
            }
        }
    }

    /// Convenience for thresholds used as a single cutoff.
    #[must_use]
    pub fn resolve_scalar(&self, name: &str, data: &[f64], mode: ComparisonMode) -> Option<f64> {
        self.resolve(name, data, mode).and_then(|v| v.primary())
    }
}
