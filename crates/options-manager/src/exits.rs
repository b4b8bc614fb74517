//! Exit rules for active recommendations.
//!
//! Price exits are checked first, then the signal-driven exits in order:
//! contradiction, structure instability, composite flip, flow divergence.

use mspi_core::config::ExitSettings;
use mspi_signals::SignalCategory;

use crate::monitor::MarketView;
use crate::targets::{stop_crossed, target_reached};
use crate::types::{ExitReason, Recommendation, RecommendationCategory};

/// Check all exit rules against a recommendation. Returns the first that fires.
pub fn check_exit_rules(
    rec: &Recommendation,
    view: &MarketView<'_>,
    settings: &ExitSettings,
) -> Option<ExitReason> {
    // 1. Price through the stop or past the final target
    if let Some(reason) = check_price_exits(rec, view) {
        return Some(reason);
    }

    // 2. Strong opposite-bias signal in the same group
    if let Some(reason) = check_contradiction(rec, view, settings) {
        return Some(reason);
    }

    // 3. Structure change at the anchor strike
    if let Some(reason) = check_structure_instability(rec, view, settings) {
        return Some(reason);
    }

    // 4. Composite score flipped against the entry
    if let Some(reason) = check_composite_flip(rec, view, settings) {
        return Some(reason);
    }

    // 5. Flow diverging against the trade at the anchor strike
    check_flow_divergence(rec, view, settings)
}

fn check_price_exits(rec: &Recommendation, view: &MarketView<'_>) -> Option<ExitReason> {
    if stop_crossed(rec.direction, view.price, rec.stop_loss) {
        tracing::warn!(
            symbol = view.symbol,
            id = rec.id,
            price = view.price,
            stop_loss = rec.stop_loss,
            "Stop loss hit"
        );
        return Some(ExitReason::StopLossHit);
    }
    if target_reached(rec.direction, view.price, rec.target_2) {
        tracing::info!(
            symbol = view.symbol,
            id = rec.id,
            price = view.price,
            target_2 = rec.target_2,
            "Final target reached"
        );
        return Some(ExitReason::TargetReached);
    }
    None
}

/// Any signal in the recommendation's group with the opposite bias at or
/// above `contradiction_stars_threshold`, at any strike.
fn check_contradiction(
    rec: &Recommendation,
    view: &MarketView<'_>,
    settings: &ExitSettings,
) -> Option<ExitReason> {
    let opposite = rec.bias.opposite();
    let strongest = rec
        .category
        .signal_categories()
        .iter()
        .map(|&c| view.signals.max_stars(c, Some(opposite)))
        .max()
        .unwrap_or(0);

    if strongest >= settings.contradiction_stars_threshold.max(1) {
        tracing::warn!(
            symbol = view.symbol,
            id = rec.id,
            category = %rec.category,
            stars = strongest,
            threshold = settings.contradiction_stars_threshold,
            "Contradicting signal, exiting"
        );
        return Some(ExitReason::Contradiction);
    }
    None
}

/// Structure change at the anchor strike. Caution recommendations are
/// themselves issued from structure changes and are exempt.
fn check_structure_instability(
    rec: &Recommendation,
    view: &MarketView<'_>,
    settings: &ExitSettings,
) -> Option<ExitReason> {
    if rec.category == RecommendationCategory::Caution {
        return None;
    }
    let stars = view
        .signals_at(SignalCategory::StructureChange, rec.anchor_strike)
        .map(|r| r.stars)
        .max()?;

    if stars >= settings.ssi_exit_stars_threshold.max(1) {
        tracing::warn!(
            symbol = view.symbol,
            id = rec.id,
            anchor = rec.anchor_strike,
            stars,
            "Structure unstable at anchor strike, exiting"
        );
        return Some(ExitReason::StructureInstability);
    }
    None
}

fn check_composite_flip(
    rec: &Recommendation,
    view: &MarketView<'_>,
    settings: &ExitSettings,
) -> Option<ExitReason> {
    let current = view.composite_near(rec.anchor_strike)?;
    let entry = rec.entry_composite;
    let flipped = entry * current < 0.0 && current.abs() >= settings.mspi_flip_threshold * entry.abs();

    if flipped {
        tracing::warn!(
            symbol = view.symbol,
            id = rec.id,
            entry_composite = entry,
            current_composite = current,
            threshold = settings.mspi_flip_threshold,
            "Composite score flipped, exiting"
        );
        return Some(ExitReason::CompositeFlip);
    }
    None
}

fn check_flow_divergence(
    rec: &Recommendation,
    view: &MarketView<'_>,
    settings: &ExitSettings,
) -> Option<ExitReason> {
    let against = rec.direction.opposite();
    let stars = view
        .signals_at(SignalCategory::FlowDivergence, rec.anchor_strike)
        .filter(|r| r.bias == against)
        .map(|r| r.stars)
        .max()?;

    if stars >= settings.arfi_exit_stars_threshold.max(1) {
        tracing::warn!(
            symbol = view.symbol,
            id = rec.id,
            anchor = rec.anchor_strike,
            stars,
            "Flow diverging against recommendation, exiting"
        );
        return Some(ExitReason::FlowDivergence);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::tests::{recommendation, view};
    use mspi_signals::{Bias, KeyLevels, SignalRecord, TradingSignals};

    fn signal(category: SignalCategory, strike: f64, bias: Bias, stars: u8) -> SignalRecord {
        SignalRecord {
            category,
            strike,
            bias,
            score: f64::from(stars),
            stars,
            composite: 0.0,
            metric: 0.0,
        }
    }

    fn signals(records: Vec<SignalRecord>) -> TradingSignals {
        let mut out = TradingSignals::default();
        for record in records {
            out.signals.entry(record.category).or_default().push(record);
        }
        out
    }

    // ============================================
    // Price exits
    // ============================================

    #[test]
    fn stop_loss_exits_first() {
        let rec = recommendation(RecommendationCategory::Directional, Bias::Bullish);
        let s = signals(vec![signal(SignalCategory::Directional, 100.0, Bias::Bearish, 5)]);
        let levels = KeyLevels::default();
        let mut v = view(&[100.0], &[0.8], &s, &levels, 2.0);
        v.price = 96.5;
        assert_eq!(check_exit_rules(&rec, &v, &ExitSettings::default()), Some(ExitReason::StopLossHit));
    }

    #[test]
    fn bearish_target_reached_below() {
        let rec = recommendation(RecommendationCategory::Directional, Bias::Bearish);
        let s = TradingSignals::default();
        let levels = KeyLevels::default();
        let mut v = view(&[100.0], &[-0.8], &s, &levels, 2.0);
        v.price = 92.5;
        assert_eq!(check_exit_rules(&rec, &v, &ExitSettings::default()), Some(ExitReason::TargetReached));
    }

    // ============================================
    // Signal exits
    // ============================================

    #[test]
    fn quiet_market_keeps_recommendation() {
        let rec = recommendation(RecommendationCategory::Directional, Bias::Bullish);
        let s = signals(vec![signal(SignalCategory::Directional, 100.0, Bias::Bearish, 3)]);
        let levels = KeyLevels::default();
        let v = view(&[100.0], &[0.8], &s, &levels, 2.0);
        assert_eq!(check_exit_rules(&rec, &v, &ExitSettings::default()), None);
    }

    #[test]
    fn strong_opposite_signal_contradicts() {
        let rec = recommendation(RecommendationCategory::Directional, Bias::Bullish);
        let s = signals(vec![signal(SignalCategory::Directional, 110.0, Bias::Bearish, 4)]);
        let levels = KeyLevels::default();
        let v = view(&[100.0, 110.0], &[0.8, -0.5], &s, &levels, 2.0);
        assert_eq!(check_exit_rules(&rec, &v, &ExitSettings::default()), Some(ExitReason::Contradiction));
    }

    #[test]
    fn contraction_contradicts_long_volatility() {
        let rec = recommendation(RecommendationCategory::Volatility, Bias::Bullish);
        let s = signals(vec![signal(SignalCategory::VolatilityContraction, 105.0, Bias::Bearish, 4)]);
        let levels = KeyLevels::default();
        let v = view(&[100.0, 105.0], &[0.8, 0.1], &s, &levels, 2.0);
        assert_eq!(check_exit_rules(&rec, &v, &ExitSettings::default()), Some(ExitReason::Contradiction));
    }

    #[test]
    fn structure_change_only_counts_at_the_anchor() {
        let rec = recommendation(RecommendationCategory::Directional, Bias::Bullish);
        let levels = KeyLevels::default();

        let elsewhere = signals(vec![signal(SignalCategory::StructureChange, 110.0, Bias::Bullish, 5)]);
        let v = view(&[100.0, 110.0], &[0.8, 0.5], &elsewhere, &levels, 2.0);
        assert_eq!(check_exit_rules(&rec, &v, &ExitSettings::default()), None);

        let at_anchor = signals(vec![signal(SignalCategory::StructureChange, 100.0, Bias::Bullish, 3)]);
        let v = view(&[100.0, 110.0], &[0.8, 0.5], &at_anchor, &levels, 2.0);
        assert_eq!(
            check_exit_rules(&rec, &v, &ExitSettings::default()),
            Some(ExitReason::StructureInstability)
        );
    }

    #[test]
    fn caution_ignores_structure_change() {
        let rec = recommendation(RecommendationCategory::Caution, Bias::Bullish);
        let s = signals(vec![signal(SignalCategory::StructureChange, 100.0, Bias::Bullish, 5)]);
        let levels = KeyLevels::default();
        let v = view(&[100.0], &[0.8], &s, &levels, 2.0);
        assert_eq!(check_exit_rules(&rec, &v, &ExitSettings::default()), None);
    }

    #[test]
    fn composite_flip_needs_magnitude() {
        let rec = recommendation(RecommendationCategory::Directional, Bias::Bullish);
        let s = TradingSignals::default();
        let levels = KeyLevels::default();

        // 0.5 < 0.7 * 0.8
        let v = view(&[100.0], &[-0.5], &s, &levels, 2.0);
        assert_eq!(check_exit_rules(&rec, &v, &ExitSettings::default()), None);

        let v = view(&[100.0], &[-0.6], &s, &levels, 2.0);
        assert_eq!(check_exit_rules(&rec, &v, &ExitSettings::default()), Some(ExitReason::CompositeFlip));
    }

    #[test]
    fn flow_divergence_against_direction() {
        let rec = recommendation(RecommendationCategory::Directional, Bias::Bullish);
        let levels = KeyLevels::default();

        let with_trade = signals(vec![signal(SignalCategory::FlowDivergence, 100.0, Bias::Bullish, 5)]);
        let v = view(&[100.0], &[0.8], &with_trade, &levels, 2.0);
        assert_eq!(check_exit_rules(&rec, &v, &ExitSettings::default()), None);

        let against = signals(vec![signal(SignalCategory::FlowDivergence, 100.0, Bias::Bearish, 4)]);
        let v = view(&[100.0], &[0.8], &against, &levels, 2.0);
        assert_eq!(check_exit_rules(&rec, &v, &ExitSettings::default()), Some(ExitReason::FlowDivergence));
    }
}
