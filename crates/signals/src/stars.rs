use mspi_core::config::RecommendationSettings;

/// Maps a continuous conviction score to a 0-5 star rating.
///
/// Cutoffs are for 5, 4, 3, 2 and 1 stars and are expected to be
/// non-increasing; ordering is not checked here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StarMapper {
    cutoffs: [f64; 5],
}

impl Default for StarMapper {
    fn default() -> Self {
        Self::new(&RecommendationSettings::default())
    }
}

impl StarMapper {
    #[must_use]
    pub fn new(settings: &RecommendationSettings) -> Self {
        Self::from_cutoffs(settings.star_cutoffs())
    }

    #[must_use]
    pub const fn from_cutoffs(cutoffs: [f64; 5]) -> Self {
        Self { cutoffs }
    }

    /// Star count for `score`; boundaries are inclusive and non-finite
    /// scores count as 0.0.
    #[must_use]
    pub fn map(&self, score: f64) -> u8 {
        let score = if score.is_finite() { score } else { 0.0 };
        self.cutoffs
            .iter()
            .zip((1..=5u8).rev())
            .find(|(cutoff, _)| score >= **cutoff)
            .map_or(0, |(_, stars)| stars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_cutoffs_are_inclusive() {
        let mapper = StarMapper::default();
        assert_eq!(mapper.map(4.0), 5);
        assert_eq!(mapper.map(3.5), 4);
        assert_eq!(mapper.map(2.0), 3);
        assert_eq!(mapper.map(1.2), 2);
        assert_eq!(mapper.map(0.5), 1);
        assert_eq!(mapper.map(0.4), 0);
    }

    #[test]
    fn non_finite_scores_are_zero_stars() {
        let mapper = StarMapper::default();
        assert_eq!(mapper.map(f64::NAN), 0);
        assert_eq!(mapper.map(f64::INFINITY), 0);
    }

    #[test]
    fn custom_cutoffs_apply() {
        let mapper = StarMapper::from_cutoffs([10.0, 8.0, 6.0, 4.0, -1.0]);
        assert_eq!(mapper.map(0.0), 1);
        assert_eq!(mapper.map(9.0), 4);
    }

    proptest! {
        #[test]
        fn stars_are_within_zero_to_five(score in prop_oneof![
            -1e9..1e9_f64,
            Just(f64::NAN),
            Just(f64::INFINITY),
            Just(f64::NEG_INFINITY),
        ]) {
            prop_assert!(StarMapper::default().map(score) <= 5);
        }

        #[test]
        fn higher_score_never_loses_stars(a in -10.0..10.0_f64, b in -10.0..10.0_f64) {
            let mapper = StarMapper::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(mapper.map(lo) <= mapper.map(hi));
        }
    }
}
