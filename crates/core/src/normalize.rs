/// Denominators below this are treated as zero.
pub const DENOMINATOR_FLOOR: f64 = 1e-9;

/// Rescales `series` into [-1, 1] by its own maximum absolute value.
///
/// Missing (NaN) and infinite entries are replaced with 0.0 first. An
/// all-missing series, or one whose maximum magnitude is below
/// [`DENOMINATOR_FLOOR`], yields all zeros.
#[must_use]
pub fn normalize_series(series: &[f64], name: &str) -> Vec<f64> {
    if series.iter().all(|v| v.is_nan()) {
        if !series.is_empty() {
            tracing::debug!(series = name, "Series entirely missing, normalizing to zeros");
        }
        return vec![0.0; series.len()];
    }

    let cleaned: Vec<f64> = series
        .iter()
        .map(|&v| if v.is_finite() { v } else { 0.0 })
        .collect();
    let max_abs = cleaned.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));

    if max_abs < DENOMINATOR_FLOOR {
        tracing::debug!(series = name, max_abs, "Max magnitude below floor, normalizing to zeros");
        return vec![0.0; series.len()];
    }

    cleaned
        .into_iter()
        .map(|v| (v / max_abs).clamp(-1.0, 1.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn scales_by_max_magnitude() {
        assert_eq!(normalize_series(&[2.0, -4.0, 1.0], "x"), vec![0.5, -1.0, 0.25]);
    }

    #[test]
    fn missing_and_infinite_become_zero() {
        let out = normalize_series(&[f64::NAN, f64::INFINITY, 5.0], "x");
        assert_eq!(out, vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn all_missing_is_all_zero() {
        assert_eq!(normalize_series(&[f64::NAN, f64::NAN], "x"), vec![0.0, 0.0]);
        assert!(normalize_series(&[], "x").is_empty());
    }

    #[test]
    fn tiny_magnitudes_collapse_to_zero() {
        assert_eq!(normalize_series(&[1e-12, -1e-11], "x"), vec![0.0, 0.0]);
    }

    proptest! {
        #[test]
        fn output_is_bounded_and_hits_one(series in prop::collection::vec(
            prop_oneof![
                -1e6..1e6_f64,
                Just(f64::NAN),
                Just(f64::INFINITY),
                Just(0.0),
            ],
            0..40,
        )) {
            let out = normalize_series(&series, "prop");
            prop_assert_eq!(out.len(), series.len());
            let max = out.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
            prop_assert!(out.iter().all(|v| v.is_finite()));
            prop_assert!(max <= 1.0);
            let degenerate = series
                .iter()
                .filter(|v| v.is_finite())
                .all(|v| v.abs() < DENOMINATOR_FLOOR);
            if !degenerate {
                prop_assert!((max - 1.0).abs() < 1e-12);
            } else {
                prop_assert!(out.iter().all(|v| *v == 0.0));
            }
        }
    }
}
