//! Directional conviction at strikes with strong structural alignment.

use super::{Bias, LevelView, Scan, ScanContext, SignalCategory};
use crate::threshold::ComparisonMode;

/// Strikes with `|sai|` at or above `sai_high_conviction` and a non-zero
/// composite score. Bias follows the composite sign.
pub(super) fn scan(view: &LevelView, ctx: &ScanContext<'_>, expansion_strikes: &[f64]) -> Scan {
    let sai = view.metric("sai")?;
    let cutoff = ctx
        .thresholds
        .resolve_scalar("sai_high_conviction", sai, ComparisonMode::Absolute)?
        .abs();
    let ssi = view.metric("ssi");
    let split = ssi.and_then(|values| {
        ctx.thresholds
            .resolve_scalar("ssi_conviction_split", values, ComparisonMode::Raw)
    });
    let rec = ctx.recommendations;

    let mut records = Vec::new();
    for row in 0..view.len() {
        let alignment = sai[row];
        let composite = view.composite[row];
        if !alignment.is_finite() || alignment.abs() < cutoff {
            continue;
        }
        let bias = Bias::from_sign(composite);
        if bias == Bias::Neutral {
            continue;
        }

        let mut score = rec
            .directional_mspi_scale
            .mul_add(composite.abs(), rec.directional_sai_scale * alignment.abs());

        if let (Some(ssi), Some(split)) = (ssi, split) {
            let stability = ssi[row];
            if stability.is_finite() {
                if stability < split {
                    score += rec.conv_mod_ssi_low;
                } else if stability > 1.0 - split {
                    score += rec.conv_mod_ssi_high;
                }
            }
        }

        if expansion_strikes.contains(&view.strikes[row]) {
            score += rec.conv_mod_vol_expansion;
        }

        let (positive, negative) = view.sdag_votes(row);
        let (agree, oppose) = match bias {
            Bias::Bullish => (positive.len(), negative.len()),
            _ => (negative.len(), positive.len()),
        };
        if agree >= ctx.min_agreement {
            score += rec.conv_mod_sdag_align;
        } else if oppose >= ctx.min_agreement {
            score += rec.conv_mod_sdag_oppose;
        }

        records.push(ctx.record(SignalCategory::Directional, view, row, bias, score, alignment));
    }
    Some(records)
}

#[cfg(test)]
mod tests {
    use crate::generator::tests::levels;
    use crate::generator::{Bias, SignalCategory, SignalGenerator};
    use mspi_core::AppConfig;

    #[test]
    fn strong_alignment_with_composite_is_directional() {
        let table = levels(&[
            ("strike", &[95.0, 100.0, 105.0]),
            ("mspi", &[0.8, -0.6, 0.9]),
            ("sai", &[0.9, -0.75, 0.3]),
            ("ssi", &[0.5, 0.5, 0.5]),
        ]);
        let signals = SignalGenerator::new(&AppConfig::default()).generate(&table, Some(100.0));
        let records = signals.get(SignalCategory::Directional);
        assert_eq!(records.len(), 2);
        // 2.5 * 0.8 + 1.5 * 0.9 = 3.35
        assert_eq!(records[0].bias, Bias::Bullish);
        assert!((records[0].score - 3.35).abs() < 1e-9);
        assert_eq!(records[0].stars, 4);
        // 2.5 * 0.6 + 1.5 * 0.75 = 2.625
        assert_eq!(records[1].bias, Bias::Bearish);
        assert_eq!(records[1].stars, 3);
    }

    #[test]
    fn low_stability_dampens_conviction() {
        let table = levels(&[
            ("strike", &[100.0]),
            ("mspi", &[0.8]),
            ("sai", &[0.9]),
            ("ssi", &[0.1]),
        ]);
        let signals = SignalGenerator::new(&AppConfig::default()).generate(&table, Some(100.0));
        let record = &signals.get(SignalCategory::Directional)[0];
        // 3.35 - 1.0
        assert!((record.score - 2.35).abs() < 1e-9);
    }

    #[test]
    fn agreeing_sdag_methods_boost_conviction() {
        let table = levels(&[
            ("strike", &[100.0]),
            ("mspi", &[0.8]),
            ("sai", &[0.9]),
            ("sdag_multiplicative_norm", &[0.5]),
            ("sdag_weighted_norm", &[0.4]),
        ]);
        let signals = SignalGenerator::new(&AppConfig::default()).generate(&table, Some(100.0));
        let record = &signals.get(SignalCategory::Directional)[0];
        assert!((record.score - 4.1).abs() < 1e-9);
        assert_eq!(record.stars, 5);
    }

    #[test]
    fn zero_composite_is_skipped() {
        let table = levels(&[("strike", &[100.0]), ("mspi", &[0.0]), ("sai", &[0.95])]);
        let signals = SignalGenerator::new(&AppConfig::default()).generate(&table, Some(100.0));
        assert!(signals.get(SignalCategory::Directional).is_empty());
        assert!(!signals.is_undecidable(SignalCategory::Directional));
    }
}
