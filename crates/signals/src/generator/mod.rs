//! Strike-level signal generation.
//!
//! Each category scans the per-strike table against its dynamic thresholds
//! and yields [`SignalRecord`]s carrying a bias, a continuous conviction
//! score and the star rating of that score. A category whose threshold or
//! input column is unavailable is reported as undecidable for the cycle
//! and yields nothing.

mod complex;
mod directional;
mod time_decay;
mod volatility;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use mspi_core::config::{DagMethodologies, RecommendationSettings, SignalActivation};
use mspi_core::{AppConfig, SdagMethod, Table, DENOMINATOR_FLOOR};
use serde::Serialize;

use crate::composite::COMPOSITE_COLUMN;
use crate::stars::StarMapper;
use crate::threshold::DynamicThresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    Directional,
    VolatilityExpansion,
    VolatilityContraction,
    PinRisk,
    CharmCascade,
    StructureChange,
    FlowDivergence,
    SdagConviction,
}

impl SignalCategory {
    pub const ALL: [Self; 8] = [
        Self::Directional,
        Self::VolatilityExpansion,
        Self::VolatilityContraction,
        Self::PinRisk,
        Self::CharmCascade,
        Self::StructureChange,
        Self::FlowDivergence,
        Self::SdagConviction,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Directional => "directional",
            Self::VolatilityExpansion => "volatility_expansion",
            Self::VolatilityContraction => "volatility_contraction",
            Self::PinRisk => "pin_risk",
            Self::CharmCascade => "charm_cascade",
            Self::StructureChange => "structure_change",
            Self::FlowDivergence => "flow_divergence",
            Self::SdagConviction => "sdag_conviction",
        }
    }

    fn enabled(self, activation: &SignalActivation) -> bool {
        match self {
            Self::Directional => activation.directional,
            Self::VolatilityExpansion => activation.volatility_expansion,
            Self::VolatilityContraction => activation.volatility_contraction,
            Self::PinRisk => activation.time_decay_pin_risk,
            Self::CharmCascade => activation.time_decay_charm_cascade,
            Self::StructureChange => activation.complex_structure_change,
            Self::FlowDivergence => activation.complex_flow_divergence,
            Self::SdagConviction => activation.complex_sdag_conviction,
        }
    }
}

impl fmt::Display for SignalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Trade direction a signal argues for. For volatility categories
/// `Bullish` means long volatility and `Bearish` short volatility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

impl Bias {
    /// Bias from the sign of `value`; near-zero and non-finite are neutral.
    #[must_use]
    pub fn from_sign(value: f64) -> Self {
        if !value.is_finite() || value.abs() < DENOMINATOR_FLOOR {
            Self::Neutral
        } else if value > 0.0 {
            Self::Bullish
        } else {
            Self::Bearish
        }
    }

    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Bullish => Self::Bearish,
            Self::Bearish => Self::Bullish,
            Self::Neutral => Self::Neutral,
        }
    }

    /// +1, -1 or 0.
    #[must_use]
    pub const fn sign(self) -> f64 {
        match self {
            Self::Bullish => 1.0,
            Self::Bearish => -1.0,
            Self::Neutral => 0.0,
        }
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bullish => write!(f, "bullish"),
            Self::Bearish => write!(f, "bearish"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

/// One qualifying strike in one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalRecord {
    pub category: SignalCategory,
    pub strike: f64,
    pub bias: Bias,
    pub score: f64,
    pub stars: u8,
    /// Composite score at the strike.
    pub composite: f64,
    /// The metric that triggered the signal.
    pub metric: f64,
}

/// Signals of one cycle, grouped by category.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TradingSignals {
    pub signals: BTreeMap<SignalCategory, Vec<SignalRecord>>,
    pub undecidable: BTreeSet<SignalCategory>,
}

impl TradingSignals {
    #[must_use]
    pub fn get(&self, category: SignalCategory) -> &[SignalRecord] {
        self.signals
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_undecidable(&self, category: SignalCategory) -> bool {
        self.undecidable.contains(&category)
    }

    /// Highest star rating in `category`, optionally restricted to `bias`.
    #[must_use]
    pub fn max_stars(&self, category: SignalCategory, bias: Option<Bias>) -> u8 {
        self.get(category)
            .iter()
            .filter(|r| bias.map_or(true, |b| r.bias == b))
            .map(|r| r.stars)
            .max()
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignalRecord> {
        self.signals.values().flatten()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.signals.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Column view of the per-strike table shared by the category scanners.
pub(crate) struct LevelView {
    pub strikes: Vec<f64>,
    pub composite: Vec<f64>,
    columns: BTreeMap<&'static str, Vec<f64>>,
    pub sdag_norms: Vec<(SdagMethod, Vec<f64>)>,
    pub price: Option<f64>,
}

const METRIC_COLUMNS: [&str; 9] = ["sai", "ssi", "cfi", "ctr", "tdfi", "vfi", "vri", "tdpi", "dag_custom"];

impl LevelView {
    fn new(levels: &Table, methods: &[SdagMethod], price: Option<f64>) -> Option<Self> {
        let strikes = levels.numeric("strike")?;
        let composite = levels
            .numeric(COMPOSITE_COLUMN)
            .unwrap_or_else(|| vec![0.0; strikes.len()]);
        let columns = METRIC_COLUMNS
            .iter()
            .filter_map(|&name| levels.numeric(name).map(|values| (name, values)))
            .collect();
        let sdag_norms = methods
            .iter()
            .filter_map(|&m| levels.numeric(&m.norm_column()).map(|values| (m, values)))
            .collect();
        Some(Self {
            strikes,
            composite,
            columns,
            sdag_norms,
            price: price.filter(|p| p.is_finite() && *p > 0.0),
        })
    }

    /// Metric column by name, if the table has it.
    pub fn metric(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.strikes.len()
    }

    /// Finite, non-zero normalized SDAG values at `row`, split by sign.
    pub fn sdag_votes(&self, row: usize) -> (Vec<f64>, Vec<f64>) {
        self.sdag_norms
            .iter()
            .filter_map(|(_, values)| values.get(row).copied())
            .filter(|v| v.is_finite() && v.abs() >= DENOMINATOR_FLOOR)
            .partition(|v| *v > 0.0)
    }
}

/// Shared scoring context for the category scanners.
pub(crate) struct ScanContext<'a> {
    pub thresholds: &'a DynamicThresholds,
    pub stars: &'a StarMapper,
    pub recommendations: &'a RecommendationSettings,
    pub min_agreement: usize,
}

impl ScanContext<'_> {
    pub fn record(
        &self,
        category: SignalCategory,
        view: &LevelView,
        row: usize,
        bias: Bias,
        score: f64,
        metric: f64,
    ) -> SignalRecord {
        let score = if score.is_finite() { score.max(0.0) } else { 0.0 };
        SignalRecord {
            category,
            strike: view.strikes[row],
            bias,
            score,
            stars: self.stars.map(score),
            composite: view.composite[row],
            metric,
        }
    }
}

/// Score for a metric that clears its threshold by `ratio` (metric over
/// threshold, or threshold over metric for "at most" rules): 1.0 at the
/// threshold rising linearly to 4.0 at 2.5x.
#[must_use]
pub fn ratio_score(ratio: f64) -> f64 {
    let excess = if ratio.is_nan() { 0.0 } else { (ratio - 1.0).clamp(0.0, 1.5) };
    2.0f64.mul_add(excess, 1.0)
}

/// Ratio of `value` over `threshold` by magnitude.
pub(crate) fn magnitude_ratio(value: f64, threshold: f64) -> f64 {
    let denom = threshold.abs();
    if denom < DENOMINATOR_FLOOR {
        f64::INFINITY
    } else {
        value.abs() / denom
    }
}

/// Result of one category scan; `None` means undecidable.
pub(crate) type Scan = Option<Vec<SignalRecord>>;

pub struct SignalGenerator {
    activation: SignalActivation,
    thresholds: DynamicThresholds,
    stars: StarMapper,
    recommendations: RecommendationSettings,
    dag: DagMethodologies,
}

impl SignalGenerator {
    #[must_use]
    pub fn new(config: &AppConfig) -> Self {
        let strategy = &config.strategy_settings;
        Self {
            activation: config.system_settings.signal_activation.clone(),
            thresholds: DynamicThresholds::new(config),
            stars: StarMapper::new(&strategy.recommendations),
            recommendations: strategy.recommendations.clone(),
            dag: strategy.dag_methodologies.clone(),
        }
    }

    #[must_use]
    pub fn thresholds(&self) -> &DynamicThresholds {
        &self.thresholds
    }

    #[must_use]
    pub fn star_mapper(&self) -> &StarMapper {
        &self.stars
    }

    /// Scans every enabled category over the per-strike `levels`.
    /// `price` orients pin-risk bias.
    #[must_use]
    pub fn generate(&self, levels: &Table, price: Option<f64>) -> TradingSignals {
        let mut out = TradingSignals::default();
        let Some(view) = LevelView::new(levels, &self.dag.active_methods(), price) else {
            tracing::warn!("Per-strike table has no strike column, no signals generated");
            out.undecidable.extend(
                SignalCategory::ALL
                    .into_iter()
                    .filter(|c| c.enabled(&self.activation)),
            );
            return out;
        };
        if view.len() == 0 {
            return out;
        }

        let ctx = ScanContext {
            thresholds: &self.thresholds,
            stars: &self.stars,
            recommendations: &self.recommendations,
            min_agreement: self.dag.min_agreement_for_conviction_signal.max(1),
        };

        // Directional conviction is dampened at strikes that also flag
        // volatility expansion, so expansion is scanned regardless of its
        // own activation flag.
        let expansion = volatility::expansion(&view, &ctx);
        let expansion_strikes: Vec<f64> = expansion
            .iter()
            .flatten()
            .map(|r| r.strike)
            .collect();

        for category in SignalCategory::ALL {
            if !category.enabled(&self.activation) {
                continue;
            }
            let scan = match category {
                SignalCategory::Directional => directional::scan(&view, &ctx, &expansion_strikes),
                SignalCategory::VolatilityExpansion => expansion.clone(),
                SignalCategory::VolatilityContraction => volatility::contraction(&view, &ctx),
                SignalCategory::PinRisk => time_decay::pin_risk(&view, &ctx),
                SignalCategory::CharmCascade => time_decay::charm_cascade(&view, &ctx),
                SignalCategory::StructureChange => complex::structure_change(&view, &ctx),
                SignalCategory::FlowDivergence => complex::flow_divergence(&view, &ctx),
                SignalCategory::SdagConviction => complex::sdag_conviction(&view, &ctx),
            };
            match scan {
                Some(records) => {
                    if !records.is_empty() {
                        tracing::debug!(category = %category, count = records.len(), "Signals generated");
                        out.signals.insert(category, records);
                    }
                }
                None => {
                    tracing::warn!(category = %category, "Signal category undecidable this cycle");
                    out.undecidable.insert(category);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mspi_core::Cell;
    use proptest::prelude::*;

    pub(super) fn levels(columns: &[(&str, &[f64])]) -> Table {
        Table::from_columns(
            columns
                .iter()
                .map(|(name, values)| (*name, values.iter().copied().map(Cell::from).collect())),
        )
        .unwrap()
    }

    #[test]
    fn ratio_score_is_bounded() {
        assert_eq!(ratio_score(1.0), 1.0);
        assert_eq!(ratio_score(0.5), 1.0);
        assert_eq!(ratio_score(1.5), 2.0);
        assert_eq!(ratio_score(10.0), 4.0);
        assert_eq!(ratio_score(f64::INFINITY), 4.0);
    }

    proptest! {
        #[test]
        fn ratio_score_stays_between_one_and_four(ratio in prop_oneof![
            -1e6..1e6_f64,
            Just(f64::NAN),
            Just(f64::INFINITY),
            Just(f64::NEG_INFINITY),
        ]) {
            let score = ratio_score(ratio);
            prop_assert!((1.0..=4.0).contains(&score));
        }

        #[test]
        fn ratio_score_never_decreases(a in 0.0..5.0_f64, b in 0.0..5.0_f64) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(ratio_score(lo) <= ratio_score(hi));
        }
    }

    #[test]
    fn bias_from_sign() {
        assert_eq!(Bias::from_sign(0.3), Bias::Bullish);
        assert_eq!(Bias::from_sign(-0.3), Bias::Bearish);
        assert_eq!(Bias::from_sign(0.0), Bias::Neutral);
        assert_eq!(Bias::from_sign(f64::NAN), Bias::Neutral);
    }

    #[test]
    fn disabled_categories_are_skipped() {
        let mut config = AppConfig::default();
        config.system_settings.signal_activation.complex_structure_change = false;
        let table = levels(&[("strike", &[100.0, 105.0]), ("ssi", &[0.05, 0.9])]);
        let signals = SignalGenerator::new(&config).generate(&table, Some(100.0));
        assert!(signals.get(SignalCategory::StructureChange).is_empty());
        assert!(!signals.is_undecidable(SignalCategory::StructureChange));
    }

    #[test]
    fn missing_metric_columns_are_undecidable() {
        let table = levels(&[("strike", &[100.0]), ("mspi", &[0.5])]);
        let signals = SignalGenerator::new(&AppConfig::default()).generate(&table, Some(100.0));
        assert!(signals.is_undecidable(SignalCategory::CharmCascade));
        assert!(signals.is_undecidable(SignalCategory::Directional));
        assert!(signals.is_empty());
    }

    #[test]
    fn no_strike_column_marks_everything_undecidable() {
        let table = levels(&[("mspi", &[0.5])]);
        let signals = SignalGenerator::new(&AppConfig::default()).generate(&table, None);
        assert_eq!(signals.undecidable.len(), SignalCategory::ALL.len());
    }

    #[test]
    fn max_stars_filters_by_bias() {
        let mut signals = TradingSignals::default();
        let record = |bias, stars| SignalRecord {
            category: SignalCategory::Directional,
            strike: 100.0,
            bias,
            score: 0.0,
            stars,
            composite: 0.0,
            metric: 0.0,
        };
        signals.signals.insert(
            SignalCategory::Directional,
            vec![record(Bias::Bullish, 2), record(Bias::Bearish, 4)],
        );
        assert_eq!(signals.max_stars(SignalCategory::Directional, None), 4);
        assert_eq!(signals.max_stars(SignalCategory::Directional, Some(Bias::Bullish)), 2);
        assert_eq!(signals.max_stars(SignalCategory::PinRisk, None), 0);
    }
}
