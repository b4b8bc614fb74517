//! Stop and target geometry from ATR and key levels.
//!
//! Targets sit at the nearest key level at least `min_target_atr_distance`
//! ATRs away in the trade direction, falling back to fixed ATR multiples
//! when no level qualifies. Bearish geometry mirrors bullish: support
//! strikes below the entry instead of resistance strikes above it.

use mspi_core::config::TargetSettings;
use mspi_signals::{Bias, KeyLevels};

use crate::types::TargetLevels;

/// Computes stop and targets for a trade in `direction` entered at `entry`.
/// A neutral direction is treated as bullish.
#[must_use]
pub fn compute_targets(
    direction: Bias,
    entry: f64,
    atr: f64,
    levels: &KeyLevels,
    settings: &TargetSettings,
) -> TargetLevels {
    // Work in "distance in the trade direction" so both sides share one path.
    let sign = if direction == Bias::Bearish { -1.0 } else { 1.0 };
    let candidates: &[f64] = if sign > 0.0 {
        &levels.resistance
    } else {
        &levels.support
    };
    let mut offsets: Vec<f64> = candidates
        .iter()
        .filter(|s| s.is_finite())
        .map(|s| (s - entry) * sign)
        .filter(|d| *d > 0.0)
        .collect();
    offsets.sort_by(f64::total_cmp);

    let min_gap = settings.min_target_atr_distance * atr;
    let next_beyond = |from: f64| offsets.iter().copied().find(|d| *d >= from + min_gap);

    let (t1, t2) = match next_beyond(0.0) {
        Some(t1) => {
            let t2 = next_beyond(t1)
                .unwrap_or_else(|| t1 + settings.target_atr_target2_multiplier_from_t1 * atr);
            (t1, t2)
        }
        None => (
            settings.target_atr_target1_multiplier_no_sr * atr,
            settings.target_atr_target2_multiplier_no_sr * atr,
        ),
    };

    TargetLevels {
        stop_loss: entry - sign * settings.target_atr_stop_loss_multiplier * atr,
        target_1: entry + sign * t1,
        target_2: entry + sign * t2,
    }
}

/// Whether `price` has crossed the stop for a trade in `direction`.
#[must_use]
pub fn stop_crossed(direction: Bias, price: f64, stop_loss: f64) -> bool {
    if direction == Bias::Bearish {
        price >= stop_loss
    } else {
        price <= stop_loss
    }
}

/// Whether `price` has reached `target` for a trade in `direction`.
#[must_use]
pub fn target_reached(direction: Bias, price: f64, target: f64) -> bool {
    if direction == Bias::Bearish {
        price <= target
    } else {
        price >= target
    }
}
