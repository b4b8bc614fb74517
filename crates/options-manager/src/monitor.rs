//! Cycle-by-cycle monitoring of active recommendations: the market view a
//! cycle evaluates against, and target/conviction re-scoring.

use chrono::{DateTime, Utc};
use mspi_core::config::TargetSettings;
use mspi_signals::{KeyLevels, SignalCategory, SignalRecord, StarMapper, TradingSignals};

use crate::targets::compute_targets;
use crate::types::{Recommendation, RecommendationStatus};

const SCORE_EPSILON: f64 = 1e-12;

/// Everything one cycle knows about a symbol. Price and ATR are validated
/// before a view is built.
#[derive(Debug, Clone, Copy)]
pub struct MarketView<'a> {
    pub symbol: &'a str,
    pub price: f64,
    pub atr: f64,
    pub strikes: &'a [f64],
    pub composite: &'a [f64],
    pub signals: &'a TradingSignals,
    pub key_levels: &'a KeyLevels,
    pub now: DateTime<Utc>,
}

impl<'a> MarketView<'a> {
    /// Strike in this cycle's table closest to `target`.
    #[must_use]
    pub fn nearest_strike(&self, target: f64) -> Option<f64> {
        nearest(self.strikes.iter().copied(), target)
    }

    /// Composite score at the strike nearest `target`.
    #[must_use]
    pub fn composite_near(&self, target: f64) -> Option<f64> {
        let index = self
            .strikes
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_finite())
            .min_by(|(_, a), (_, b)| (*a - target).abs().total_cmp(&(*b - target).abs()))
            .map(|(i, _)| i)?;
        self.composite.get(index).copied().filter(|v| v.is_finite())
    }

    /// Signals of `category` at the strike nearest `anchor`.
    pub fn signals_at(
        &self,
        category: SignalCategory,
        anchor: f64,
    ) -> impl Iterator<Item = &'a SignalRecord> {
        let strike = self.nearest_strike(anchor);
        self.signals
            .get(category)
            .iter()
            .filter(move |r| Some(r.strike) == strike)
    }
}

/// Finite value from `values` closest to `target`.
pub(crate) fn nearest(values: impl Iterator<Item = f64>, target: f64) -> Option<f64> {
    values
        .filter(|v| v.is_finite())
        .min_by(|a, b| (a - target).abs().total_cmp(&(b - target).abs()))
}

/// Recomputes targets from the latest ATR and key levels and re-scores
/// conviction. Returns whether anything visible changed.
///
/// Stop and targets stay anchored to `entry_price`; only the ATR and the
/// support and resistance snapshot move them.
///
/// A same-bias signal in the recommendation's group at its anchor strike
/// sets the score outright. Otherwise the entry conviction is scaled by how
/// much of the entry composite magnitude remains, never above the entry
/// conviction.
pub fn adjust(
    rec: &mut Recommendation,
    view: &MarketView<'_>,
    stars: &StarMapper,
    settings: &TargetSettings,
) -> bool {
    let targets = compute_targets(rec.direction, rec.entry_price, view.atr, view.key_levels, settings);
    let composite = view.composite_near(rec.anchor_strike);

    let refreshed = rec
        .category
        .signal_categories()
        .iter()
        .flat_map(|&c| view.signals_at(c, rec.anchor_strike))
        .filter(|r| r.bias == rec.bias)
        .map(|r| r.score)
        .max_by(f64::total_cmp);

    let score = match (refreshed, composite) {
        (Some(score), _) => score,
        (None, Some(current)) if rec.entry_composite.abs() > SCORE_EPSILON => {
            let retained = if current * rec.entry_composite > 0.0 {
                (current.abs() / rec.entry_composite.abs()).min(1.0)
            } else {
                0.0
            };
            rec.entry_conviction * retained
        }
        _ => rec.conviction_score,
    };
    let new_stars = stars.map(score);

    let changed = targets != rec.targets()
        || new_stars != rec.stars
        || (score - rec.conviction_score).abs() > SCORE_EPSILON;

    if let Some(current) = composite {
        rec.last_composite = current;
    }
    if changed {
        tracing::debug!(
            symbol = view.symbol,
            id = rec.id,
            category = %rec.category,
            stars = new_stars,
            score,
            stop_loss = targets.stop_loss,
            target_1 = targets.target_1,
            target_2 = targets.target_2,
            "Adjusted recommendation"
        );
        rec.apply_targets(targets);
        rec.stars = new_stars;
        rec.conviction_score = score;
        rec.status = RecommendationStatus::Adjusted;
        rec.adjustments += 1;
        rec.updated_at = view.now;
    }
    changed
}
