//! Volatility expansion and contraction.

use super::{magnitude_ratio, ratio_score, Bias, LevelView, Scan, ScanContext, SignalCategory};
use crate::threshold::ComparisonMode;

/// `|vri|` at or above its trigger together with `vfi` at or above its
/// trigger. Argues for long volatility.
pub(super) fn expansion(view: &LevelView, ctx: &ScanContext<'_>) -> Scan {
    let vri = view.metric("vri")?;
    let vfi = view.metric("vfi")?;
    let vri_cut = ctx
        .thresholds
        .resolve_scalar("vol_expansion_vri_trigger", vri, ComparisonMode::Absolute)?
        .abs();
    let vfi_cut = ctx
        .thresholds
        .resolve_scalar("vol_expansion_vfi_trigger", vfi, ComparisonMode::Raw)?;

    let records = (0..view.len())
        .filter(|&row| {
            let (v, f) = (vri[row], vfi[row]);
            v.is_finite() && f.is_finite() && v.abs() >= vri_cut && f >= vfi_cut
        })
        .map(|row| {
            let score = (ratio_score(magnitude_ratio(vri[row], vri_cut))
                + ratio_score(magnitude_ratio(vfi[row], vfi_cut)))
                / 2.0;
            ctx.record(
                SignalCategory::VolatilityExpansion,
                view,
                row,
                Bias::Bullish,
                score,
                vri[row],
            )
        })
        .collect();
    Some(records)
}

/// Quiet `|vri|` and `vfi` at a structurally stable strike. Argues for
/// short volatility.
pub(super) fn contraction(view: &LevelView, ctx: &ScanContext<'_>) -> Scan {
    let vri = view.metric("vri")?;
    let vfi = view.metric("vfi")?;
    let ssi = view.metric("ssi")?;
    let vri_cut = ctx
        .thresholds
        .resolve_scalar("vol_contraction_vri_trigger", vri, ComparisonMode::Absolute)?
        .abs();
    let vfi_cut = ctx
        .thresholds
        .resolve_scalar("vol_contraction_vfi_trigger", vfi, ComparisonMode::Raw)?;
    let ssi_cut = ctx
        .thresholds
        .resolve_scalar("ssi_vol_contraction", ssi, ComparisonMode::Raw)?;

    let records = (0..view.len())
        .filter(|&row| {
            let (v, f, s) = (vri[row], vfi[row], ssi[row]);
            v.is_finite()
                && f.is_finite()
                && s.is_finite()
                && v.abs() <= vri_cut
                && f <= vfi_cut
                && s >= ssi_cut
        })
        .map(|row| {
            let score = (ratio_score(magnitude_ratio(vri_cut, vri[row]))
                + ratio_score(magnitude_ratio(vfi_cut, vfi[row]))
                + ratio_score(magnitude_ratio(ssi[row], ssi_cut)))
                / 3.0;
            ctx.record(
                SignalCategory::VolatilityContraction,
                view,
                row,
                Bias::Bearish,
                score,
                vri[row],
            )
        })
        .collect();
    Some(records)
}
