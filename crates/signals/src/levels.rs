//! Key price levels derived from per-strike aggregates.

use mspi_core::config::TargetSettings;
use mspi_core::{AppConfig, Table};
use serde::Serialize;

use crate::composite::COMPOSITE_COLUMN;
use crate::threshold::{percentile, ComparisonMode, DynamicThresholds};

const PRESSURE_COLUMN: &str = "net_value_pressure";

/// Strike levels of interest, each list ascending.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KeyLevels {
    /// Strikes with concentrated positive pressure.
    pub support: Vec<f64>,
    /// Strikes with concentrated negative pressure.
    pub resistance: Vec<f64>,
    pub high_conviction: Vec<f64>,
    pub structure_change: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct LevelFinder {
    targets: TargetSettings,
}

impl LevelFinder {
    #[must_use]
    pub fn new(config: &AppConfig) -> Self {
        Self {
            targets: config.strategy_settings.targets.clone(),
        }
    }

    #[must_use]
    pub fn identify(&self, levels: &Table, thresholds: &DynamicThresholds) -> KeyLevels {
        let Some(strikes) = levels.numeric("strike") else {
            return KeyLevels::default();
        };

        let (support, resistance) = self.pressure_levels(levels, &strikes);

        let high_conviction = levels
            .numeric("sai")
            .and_then(|sai| {
                let cutoff =
                    thresholds.resolve_scalar("sai_high_conviction", &sai, ComparisonMode::Absolute)?;
                Some(select(&strikes, &sai, |v| v.abs() >= cutoff))
            })
            .unwrap_or_default();

        let structure_change = levels
            .numeric("ssi")
            .and_then(|ssi| {
                let cutoff =
                    thresholds.resolve_scalar("ssi_structure_change", &ssi, ComparisonMode::Raw)?;
                Some(select(&strikes, &ssi, |v| v <= cutoff))
            })
            .unwrap_or_default();

        tracing::debug!(
            support = support.len(),
            resistance = resistance.len(),
            high_conviction = high_conviction.len(),
            structure_change = structure_change.len(),
            "Identified key levels"
        );

        KeyLevels {
            support,
            resistance,
            high_conviction,
            structure_change,
        }
    }

    fn pressure_levels(&self, levels: &Table, strikes: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let (column, pressure) = match levels.numeric(PRESSURE_COLUMN) {
            Some(values) => (PRESSURE_COLUMN, values),
            None => match levels.numeric(COMPOSITE_COLUMN) {
                Some(values) => {
                    tracing::debug!("Net value pressure missing, using composite score for levels");
                    (COMPOSITE_COLUMN, values)
                }
                None => return (Vec::new(), Vec::new()),
            },
        };

        let mut sorted: Vec<f64> = pressure.iter().copied().filter(|v| v.is_finite()).collect();
        sorted.sort_by(f64::total_cmp);
        let support_cut = percentile(&sorted, self.targets.nvp_support_quantile * 100.0);
        let resistance_cut = percentile(&sorted, self.targets.nvp_resistance_quantile * 100.0);

        let support = support_cut
            .map(|cut| select(strikes, &pressure, |v| v > 0.0 && v >= cut))
            .unwrap_or_default();
        let resistance = resistance_cut
            .map(|cut| select(strikes, &pressure, |v| v < 0.0 && v <= cut))
            .unwrap_or_default();
        tracing::debug!(column, ?support_cut, ?resistance_cut, "Pressure level cutoffs");
        (support, resistance)
    }
}

fn select(strikes: &[f64], values: &[f64], keep: impl Fn(f64) -> bool) -> Vec<f64> {
    let mut picked: Vec<f64> = strikes
        .iter()
        .zip(values)
        .filter(|(s, v)| s.is_finite() && v.is_finite() && keep(**v))
        .map(|(s, _)| *s)
        .collect();
    picked.sort_by(f64::total_cmp);
    picked
}
