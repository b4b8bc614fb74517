//! Time-decay driven categories: pin risk and charm cascades.

use super::{magnitude_ratio, ratio_score, Bias, LevelView, Scan, ScanContext, SignalCategory};
use crate::threshold::ComparisonMode;

/// Strikes with outsized `|tdpi|`. Price is expected to gravitate toward
/// the strike, so bias points from the current price to the strike.
pub(super) fn pin_risk(view: &LevelView, ctx: &ScanContext<'_>) -> Scan {
    let tdpi = view.metric("tdpi")?;
    let cutoff = ctx
        .thresholds
        .resolve_scalar("pin_risk_tdpi_trigger", tdpi, ComparisonMode::Absolute)?
        .abs();

    let records = (0..view.len())
        .filter(|&row| tdpi[row].is_finite() && tdpi[row].abs() >= cutoff)
        .map(|row| {
            let bias = view
                .price
                .map_or(Bias::Neutral, |price| Bias::from_sign(view.strikes[row] - price));
            let score = ratio_score(magnitude_ratio(tdpi[row], cutoff));
            ctx.record(SignalCategory::PinRisk, view, row, bias, score, tdpi[row])
        })
        .collect();
    Some(records)
}

/// Charm-driven hedging flow: both `ctr` and `tdfi` at or above their
/// triggers. Bias follows the composite score at the strike.
pub(super) fn charm_cascade(view: &LevelView, ctx: &ScanContext<'_>) -> Scan {
    let ctr = view.metric("ctr")?;
    let tdfi = view.metric("tdfi")?;
    let ctr_cut = ctx
        .thresholds
        .resolve_scalar("charm_cascade_ctr_trigger", ctr, ComparisonMode::Raw)?;
    let tdfi_cut = ctx
        .thresholds
        .resolve_scalar("charm_cascade_tdfi_trigger", tdfi, ComparisonMode::Raw)?;

    let records = (0..view.len())
        .filter(|&row| {
            let (c, t) = (ctr[row], tdfi[row]);
            c.is_finite() && t.is_finite() && c >= ctr_cut && t >= tdfi_cut
        })
        .map(|row| {
            let score = (ratio_score(magnitude_ratio(ctr[row], ctr_cut))
                + ratio_score(magnitude_ratio(tdfi[row], tdfi_cut)))
                / 2.0;
            let bias = Bias::from_sign(view.composite[row]);
            ctx.record(SignalCategory::CharmCascade, view, row, bias, score, ctr[row])
        })
        .collect();
    Some(records)
}
