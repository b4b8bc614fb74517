//! Categories combining several metrics: structure changes, flow
//! divergence and SDAG methodology agreement.

use super::{magnitude_ratio, ratio_score, Bias, LevelView, Scan, ScanContext, SignalCategory};
use crate::threshold::ComparisonMode;

/// Strikes whose structure stability index fell to or below its trigger.
///
/// Bias follows the composite at the strike. A strike with a flat composite
/// is still reported, with a neutral bias: it shows up in key levels and
/// exit checks but has no direction to issue a caution against.
pub(super) fn structure_change(view: &LevelView, ctx: &ScanContext<'_>) -> Scan {
    let ssi = view.metric("ssi")?;
    let cutoff = ctx
        .thresholds
        .resolve_scalar("ssi_structure_change", ssi, ComparisonMode::Raw)?;

    let records = (0..view.len())
        .filter(|&row| ssi[row].is_finite() && ssi[row] <= cutoff)
        .map(|row| {
            let score = ratio_score(magnitude_ratio(cutoff, ssi[row]));
            let bias = Bias::from_sign(view.composite[row]);
            ctx.record(SignalCategory::StructureChange, view, row, bias, score, ssi[row])
        })
        .collect();
    Some(records)
}

/// Capital flow (`cfi`) strong enough to clear the first tier while pointing
/// against the composite score. Every further tier cleared adds a point.
pub(super) fn flow_divergence(view: &LevelView, ctx: &ScanContext<'_>) -> Scan {
    let cfi = view.metric("cfi")?;
    let tiers = ctx
        .thresholds
        .resolve("cfi_flow_divergence", cfi, ComparisonMode::Raw)?
        .tiers();
    let (first, rest) = tiers.split_first()?;
    let first = first.abs();

    let records = (0..view.len())
        .filter_map(|row| {
            let flow = cfi[row];
            if !flow.is_finite() || flow.abs() < first {
                return None;
            }
            let flow_bias = Bias::from_sign(flow);
            let composite_bias = Bias::from_sign(view.composite[row]);
            if flow_bias == Bias::Neutral
                || composite_bias == Bias::Neutral
                || flow_bias == composite_bias
            {
                return None;
            }
            let extra_tiers = rest.iter().filter(|t| flow.abs() >= t.abs()).count();
            let score = ratio_score(magnitude_ratio(flow, first)) + extra_tiers as f64;
            Some(ctx.record(SignalCategory::FlowDivergence, view, row, flow_bias, score, flow))
        })
        .collect();
    Some(records)
}

/// At least `min_agreement` active SDAG methodologies agree in sign.
pub(super) fn sdag_conviction(view: &LevelView, ctx: &ScanContext<'_>) -> Scan {
    if view.sdag_norms.is_empty() {
        return None;
    }
    let min = ctx.min_agreement;

    let records = (0..view.len())
        .filter_map(|row| {
            let (positive, negative) = view.sdag_votes(row);
            let (bias, agreeing) = match positive.len().cmp(&negative.len()) {
                std::cmp::Ordering::Greater => (Bias::Bullish, positive),
                std::cmp::Ordering::Less => (Bias::Bearish, negative),
                std::cmp::Ordering::Equal => return None,
            };
            if agreeing.len() < min {
                return None;
            }
            let mean_magnitude =
                agreeing.iter().map(|v| v.abs()).sum::<f64>() / agreeing.len() as f64;
            let score = 2.0f64.mul_add(mean_magnitude, 1.0 + (agreeing.len() - min) as f64);
            Some(ctx.record(
                SignalCategory::SdagConviction,
                view,
                row,
                bias,
                score,
                bias.sign() * mean_magnitude,
            ))
        })
        .collect();
    Some(records)
}

#[cfg(test)]
mod tests {
    use crate::generator::tests::levels;
    use crate::generator::{Bias, SignalCategory, SignalGenerator};
    use mspi_core::AppConfig;

    #[test]
    fn low_stability_marks_structure_change() {
        // 15th percentile of [0.05, 0.6, 0.9] = 0.215
        let table = levels(&[
            ("strike", &[95.0, 100.0, 105.0]),
            ("mspi", &[0.4, 0.0, -0.2]),
            ("ssi", &[0.05, 0.6, 0.9]),
        ]);
        let signals = SignalGenerator::new(&AppConfig::default()).generate(&table, Some(100.0));
        let records = signals.get(SignalCategory::StructureChange);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].strike, 95.0);
        assert_eq!(records[0].bias, Bias::Bullish);
        // 0.215 / 0.05 is well past 2.5x, the maximum score
        assert_eq!(records[0].stars, 5);
    }

    #[test]
    fn flat_composite_structure_change_is_neutral() {
        let table = levels(&[
            ("strike", &[95.0, 100.0, 105.0]),
            ("mspi", &[0.0, 0.3, -0.2]),
            ("ssi", &[0.05, 0.6, 0.9]),
        ]);
        let signals = SignalGenerator::new(&AppConfig::default()).generate(&table, Some(100.0));
        let records = signals.get(SignalCategory::StructureChange);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].bias, Bias::Neutral);
        assert_eq!(records[0].stars, 5);
    }

    #[test]
    fn divergence_requires_opposing_flow() {
        let table = levels(&[
            ("strike", &[95.0, 100.0, 105.0]),
            ("mspi", &[0.5, 0.5, -0.5]),
            ("cfi", &[-1.3, 1.3, 0.5]),
        ]);
        let signals = SignalGenerator::new(&AppConfig::default()).generate(&table, Some(100.0));
        let records = signals.get(SignalCategory::FlowDivergence);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].strike, 95.0);
        assert_eq!(records[0].bias, Bias::Bearish);
        // ratio 1.3 / 0.75 plus one extra tier (1.25)
        let expected = 1.0 + 2.0 * (1.3 / 0.75 - 1.0) + 1.0;
        assert!((records[0].score - expected).abs() < 1e-9);
    }

    #[test]
    fn sdag_agreement_counts_active_methods() {
        let table = levels(&[
            ("strike", &[95.0, 100.0]),
            ("sdag_multiplicative_norm", &[0.6, 0.6]),
            ("sdag_weighted_norm", &[0.4, -0.4]),
            ("sdag_volatility_focused_norm", &[0.2, -0.2]),
        ]);
        let signals = SignalGenerator::new(&AppConfig::default()).generate(&table, Some(100.0));
        let records = signals.get(SignalCategory::SdagConviction);
        assert_eq!(records.len(), 2);
        // three agree: 1 + (3 - 2) + 2 * 0.4
        assert!((records[0].score - 2.8).abs() < 1e-9);
        assert_eq!(records[1].bias, Bias::Bearish);
    }

    #[test]
    fn no_sdag_columns_is_undecidable() {
        let table = levels(&[("strike", &[95.0]), ("mspi", &[0.5])]);
        let signals = SignalGenerator::new(&AppConfig::default()).generate(&table, Some(100.0));
        assert!(signals.is_undecidable(SignalCategory::SdagConviction));
    }
}
