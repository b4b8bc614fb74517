//! Composite conviction score (MSPI) per strike.
//!
//! `mspi = sum_k w_k * normalize(component_k)` where each component column is
//! normalized across strikes by its own max magnitude.

use mspi_core::{normalize_series, Table};

use crate::weights::WeightSelection;

/// Name of the composite score column.
pub const COMPOSITE_COLUMN: &str = "mspi";

/// Blends component columns into the composite score.
pub struct CompositeScorer;

impl CompositeScorer {
    /// Writes the composite column into `levels` and returns it.
    ///
    /// When none of the weighted components is present the existing
    /// composite column is kept as supplied; if there is none either, the
    /// composite is all zeros.
    pub fn apply(levels: &mut Table, selection: &WeightSelection) -> Vec<f64> {
        let mut composite = vec![0.0; levels.len()];
        let mut used = 0_usize;

        for (component, weight) in &selection.weights {
            let Some(values) = levels.numeric(component) else {
                if *weight > 0.0 {
                    tracing::warn!(component = %component, weight, "Weighted component missing, contributes zero");
                }
                continue;
            };
            used += 1;
            let normalized = normalize_series(&values, component);
            for (acc, v) in composite.iter_mut().zip(normalized) {
                *acc = weight.mul_add(v, *acc);
            }
        }

        if used == 0 {
            if let Some(existing) = levels.numeric(COMPOSITE_COLUMN) {
                tracing::debug!("No component columns, keeping supplied composite scores");
                return existing
                    .into_iter()
                    .map(|v| if v.is_finite() { v } else { 0.0 })
                    .collect();
            }
            tracing::warn!(levels = levels.len(), "No component columns, composite is zero");
        }

        levels.set_numeric(COMPOSITE_COLUMN, &composite);
        composite
    }
}
