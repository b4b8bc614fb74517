//! Typed configuration for the conviction engine.
//!
//! `AppConfig::default()` is the built-in configuration. Its JSON
//! serialization is the built-in default tree that user overrides are
//! deep-merged onto (see [`crate::config_loader`]), so every lookup path has a
//! statically known default.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;

/// Mapping of metric-component name to blend weight.
pub type WeightSet = BTreeMap<String, f64>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub version: String,
    pub system_settings: SystemSettings,
    pub data_processor_settings: DataProcessorSettings,
    pub strategy_settings: StrategySettings,
    /// Opaque to the engine; carried so the default tree is complete.
    pub visualization_settings: serde_json::Value,
    pub validation: ValidationSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "2.4.1-EliteSchema-Stateful-FullConfig-ProductionReady".to_string(),
            system_settings: SystemSettings::default(),
            data_processor_settings: DataProcessorSettings::default(),
            strategy_settings: StrategySettings::default(),
            visualization_settings: json!({
                "mspi_visualizer": {
                    "column_names": { "net_value_pressure": "net_value_pressure" }
                }
            }),
            validation: ValidationSettings::default(),
        }
    }
}

impl AppConfig {
    /// Serializes the configuration into a JSON tree.
    #[must_use]
    pub fn to_tree(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
    }
}

// ============================================
// System settings
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSettings {
    pub log_level: String,
    /// Capacity of the per-strike snapshot history. Non-positive values are
    /// replaced by [`DEFAULT_HISTORY_MAXLEN`].
    pub df_history_maxlen: i64,
    pub signal_activation: SignalActivation,
}

pub const DEFAULT_HISTORY_MAXLEN: usize = 5;

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
            df_history_maxlen: DEFAULT_HISTORY_MAXLEN as i64,
            signal_activation: SignalActivation::default(),
        }
    }
}

impl SystemSettings {
    /// History capacity with the non-positive guard applied.
    #[must_use]
    pub fn history_capacity(&self) -> usize {
        if self.df_history_maxlen > 0 {
            self.df_history_maxlen as usize
        } else {
            tracing::warn!(
                configured = self.df_history_maxlen,
                fallback = DEFAULT_HISTORY_MAXLEN,
                "Invalid df_history_maxlen, using default"
            );
            DEFAULT_HISTORY_MAXLEN
        }
    }
}

/// Per-category on/off switches for signal generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalActivation {
    pub directional: bool,
    pub volatility_expansion: bool,
    pub volatility_contraction: bool,
    pub time_decay_pin_risk: bool,
    pub time_decay_charm_cascade: bool,
    pub complex_structure_change: bool,
    pub complex_flow_divergence: bool,
    pub complex_sdag_conviction: bool,
}

impl Default for SignalActivation {
    fn default() -> Self {
        Self {
            directional: true,
            volatility_expansion: true,
            volatility_contraction: true,
            time_decay_pin_risk: true,
            time_decay_charm_cascade: true,
            complex_structure_change: true,
            complex_flow_divergence: true,
            complex_sdag_conviction: true,
        }
    }
}

// ============================================
// Data processor settings
// ============================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataProcessorSettings {
    pub weights: WeightsConfig,
    pub coefficients: Coefficients,
    pub factors: Factors,
    pub approximations: Approximations,
    pub iv_context_parameters: IvContextParameters,
}

/// Which policy picks the component weight set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionLogic {
    #[default]
    TimeBased,
    VolatilityBased,
    /// Any unrecognized policy name; resolved to the fallback weight set.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsConfig {
    pub selection_logic: SelectionLogic,
    pub time_based: TimeBasedWeights,
    pub volatility_based: VolatilityBasedWeights,
    pub time_based_definitions: TimeBasedDefinitions,
}

fn weight_set(entries: &[(&str, f64)]) -> WeightSet {
    entries
        .iter()
        .map(|(name, weight)| ((*name).to_string(), *weight))
        .collect()
}

/// Hardcoded last-resort weights, identical to the built-in midday set.
#[must_use]
pub fn failsafe_weights() -> WeightSet {
    weight_set(&[
        ("dag_custom", 0.3),
        ("tdpi", 0.3),
        ("vri", 0.2),
        ("sdag_multiplicative_norm", 0.2),
    ])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeBasedWeights {
    pub morning: WeightSet,
    pub midday: WeightSet,
    #[serde(rename = "final")]
    pub final_session: WeightSet,
}

impl Default for TimeBasedWeights {
    fn default() -> Self {
        Self {
            morning: weight_set(&[
                ("dag_custom", 0.3),
                ("tdpi", 0.2),
                ("vri", 0.2),
                ("sdag_multiplicative_norm", 0.1),
                ("sdag_weighted_norm", 0.1),
                ("sdag_volatility_focused_norm", 0.1),
            ]),
            midday: failsafe_weights(),
            final_session: weight_set(&[
                ("dag_custom", 0.2),
                ("tdpi", 0.4),
                ("vri", 0.2),
                ("sdag_multiplicative_norm", 0.2),
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilityBasedWeights {
    /// Percentile (0-100) separating the low and high IV regimes.
    pub iv_percentile_threshold: f64,
    pub low_iv: WeightSet,
    pub high_iv: WeightSet,
}

impl Default for VolatilityBasedWeights {
    fn default() -> Self {
        Self {
            iv_percentile_threshold: 50.0,
            low_iv: weight_set(&[
                ("dag_custom", 0.45),
                ("tdpi", 0.2),
                ("vri", 0.15),
                ("sdag_multiplicative_norm", 0.2),
            ]),
            high_iv: weight_set(&[
                ("dag_custom", 0.3),
                ("tdpi", 0.25),
                ("vri", 0.25),
                ("sdag_multiplicative_norm", 0.2),
            ]),
        }
    }
}

/// Session boundaries as `HH:MM:SS` strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeBasedDefinitions {
    pub morning_end: String,
    pub midday_end: String,
    pub market_open: String,
    pub market_close: String,
}

impl Default for TimeBasedDefinitions {
    fn default() -> Self {
        Self {
            morning_end: "11:00:00".to_string(),
            midday_end: "14:00:00".to_string(),
            market_open: "09:30:00".to_string(),
            market_close: "16:00:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentCoefficients {
    pub aligned: f64,
    pub opposed: f64,
    pub neutral: f64,
}

impl Default for AlignmentCoefficients {
    fn default() -> Self {
        Self {
            aligned: 1.3,
            opposed: 0.7,
            neutral: 1.0,
        }
    }
}

/// Coefficients consumed by the per-contract metric formulas.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Coefficients {
    pub dag_alpha: AlignmentCoefficients,
    pub tdpi_beta: AlignmentCoefficients,
    pub vri_gamma: AlignmentCoefficients,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Factors {
    pub tdpi_gaussian_width: f64,
    pub vri_vol_trend_fallback_factor: f64,
}

impl Default for Factors {
    fn default() -> Self {
        Self {
            tdpi_gaussian_width: -0.5,
            vri_vol_trend_fallback_factor: 0.95,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Approximations {
    pub tdpi_atr_fallback: AtrFallbackConfig,
    /// Minimum number of valid bars for a history-based ATR.
    pub atr_period: usize,
}

impl Default for Approximations {
    fn default() -> Self {
        Self {
            tdpi_atr_fallback: AtrFallbackConfig::default(),
            atr_period: 14,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtrFallbackKind {
    #[default]
    PercentageOfPrice,
    /// Unrecognized fallback type; only the minimum value is used.
    #[serde(other)]
    MinValueOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AtrFallbackConfig {
    #[serde(rename = "type")]
    pub kind: AtrFallbackKind,
    pub percentage: f64,
    pub min_value: f64,
}

impl Default for AtrFallbackConfig {
    fn default() -> Self {
        Self {
            kind: AtrFallbackKind::PercentageOfPrice,
            percentage: 0.005,
            min_value: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IvContextParameters {
    /// Key of the IV percentile (fraction in [0, 1]) inside the IV context.
    pub iv_percentile: String,
}

impl Default for IvContextParameters {
    fn default() -> Self {
        Self {
            iv_percentile: "iv_percentile_30d".to_string(),
        }
    }
}

// ============================================
// Thresholds
// ============================================

/// A resolved threshold: either a single cutoff or an ordered tier list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdValue {
    Scalar(f64),
    Tiers(Vec<f64>),
}

impl ThresholdValue {
    /// The scalar cutoff, or the first tier of a tier list.
    #[must_use]
    pub fn primary(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::Tiers(tiers) => tiers.first().copied(),
        }
    }

    /// All cutoffs in configured order.
    #[must_use]
    pub fn tiers(&self) -> Vec<f64> {
        match self {
            Self::Scalar(v) => vec![*v],
            Self::Tiers(tiers) => tiers.clone(),
        }
    }

    /// True when every cutoff is finite (and a tier list is non-empty).
    #[must_use]
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Scalar(v) => v.is_finite(),
            Self::Tiers(tiers) => !tiers.is_empty() && tiers.iter().all(|t| t.is_finite()),
        }
    }
}

fn default_percentile() -> f64 {
    50.0
}

fn default_factor() -> f64 {
    1.0
}

/// How a threshold is derived from live data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThresholdSpec {
    /// A configured scalar `value` or ordered `tiers`; no data needed.
    Fixed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tiers: Option<Vec<f64>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback_value: Option<ThresholdValue>,
    },
    /// The `percentile`-th percentile (0-100) of the data series.
    RelativePercentile {
        #[serde(default = "default_percentile")]
        percentile: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback_value: Option<ThresholdValue>,
    },
    /// `factor` times the mean of the data series.
    RelativeMeanFactor {
        #[serde(default = "default_factor")]
        factor: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback_value: Option<ThresholdValue>,
    },
}

impl ThresholdSpec {
    #[must_use]
    pub fn fixed(value: f64) -> Self {
        Self::Fixed {
            value: Some(value),
            tiers: None,
            fallback_value: Some(ThresholdValue::Scalar(value)),
        }
    }

    #[must_use]
    pub fn fixed_tiers(tiers: Vec<f64>, fallback: f64) -> Self {
        Self::Fixed {
            value: None,
            tiers: Some(tiers),
            fallback_value: Some(ThresholdValue::Scalar(fallback)),
        }
    }

    #[must_use]
    pub fn percentile(percentile: f64, fallback: f64) -> Self {
        Self::RelativePercentile {
            percentile,
            fallback_value: Some(ThresholdValue::Scalar(fallback)),
        }
    }

    #[must_use]
    pub fn mean_factor(factor: f64, fallback: f64) -> Self {
        Self::RelativeMeanFactor {
            factor,
            fallback_value: Some(ThresholdValue::Scalar(fallback)),
        }
    }

    #[must_use]
    pub fn fallback_value(&self) -> Option<&ThresholdValue> {
        match self {
            Self::Fixed { fallback_value, .. }
            | Self::RelativePercentile { fallback_value, .. }
            | Self::RelativeMeanFactor { fallback_value, .. } => fallback_value.as_ref(),
        }
    }

    /// Short label for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Fixed { .. } => "fixed",
            Self::RelativePercentile { .. } => "relative_percentile",
            Self::RelativeMeanFactor { .. } => "relative_mean_factor",
        }
    }
}

fn default_thresholds() -> BTreeMap<String, ThresholdSpec> {
    [
        ("sai_high_conviction", ThresholdSpec::fixed(0.7)),
        ("ssi_structure_change", ThresholdSpec::percentile(15.0, 0.3)),
        ("ssi_vol_contraction", ThresholdSpec::percentile(85.0, 0.7)),
        ("ssi_conviction_split", ThresholdSpec::fixed(0.2)),
        (
            "cfi_flow_divergence",
            ThresholdSpec::fixed_tiers(vec![0.75, 1.25], 0.75),
        ),
        ("vol_expansion_vri_trigger", ThresholdSpec::mean_factor(1.5, 0.5)),
        ("vol_expansion_vfi_trigger", ThresholdSpec::fixed(1.2)),
        ("vol_contraction_vri_trigger", ThresholdSpec::mean_factor(0.5, 0.2)),
        ("vol_contraction_vfi_trigger", ThresholdSpec::fixed(0.8)),
        ("pin_risk_tdpi_trigger", ThresholdSpec::mean_factor(1.5, 0.4)),
        ("charm_cascade_ctr_trigger", ThresholdSpec::fixed(1.2)),
        ("charm_cascade_tdfi_trigger", ThresholdSpec::fixed(1.2)),
        ("arfi_strong_flow_threshold", ThresholdSpec::fixed(1.5)),
        ("arfi_low_flow_threshold", ThresholdSpec::fixed(0.5)),
        ("sdag_vf_strong_negative_threshold", ThresholdSpec::fixed(-0.5)),
    ]
    .into_iter()
    .map(|(name, spec)| (name.to_string(), spec))
    .collect()
}

/// Deserializes the threshold table entry by entry so one malformed spec
/// does not discard the rest of the strategy section.
fn lenient_thresholds<'de, D>(deserializer: D) -> Result<BTreeMap<String, ThresholdSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    let mut specs = BTreeMap::new();
    for (name, value) in raw {
        match serde_json::from_value::<ThresholdSpec>(value) {
            Ok(spec) => {
                specs.insert(name, spec);
            }
            Err(e) => {
                tracing::warn!(threshold = %name, error = %e, "Dropping malformed threshold spec");
            }
        }
    }
    Ok(specs)
}

// ============================================
// Strategy settings
// ============================================

/// Alternative delta-adjusted-gamma methodologies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SdagMethod {
    Multiplicative,
    Directional,
    Weighted,
    VolatilityFocused,
}

impl SdagMethod {
    pub const ALL: [Self; 4] = [
        Self::Multiplicative,
        Self::Directional,
        Self::Weighted,
        Self::VolatilityFocused,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Multiplicative => "multiplicative",
            Self::Directional => "directional",
            Self::Weighted => "weighted",
            Self::VolatilityFocused => "volatility_focused",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Column holding the raw per-contract value.
    #[must_use]
    pub fn raw_column(self) -> String {
        format!("sdag_{}", self.name())
    }

    /// Column holding the normalized value.
    #[must_use]
    pub fn norm_column(self) -> String {
        format!("sdag_{}_norm", self.name())
    }
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdagMethodSettings {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub weight_in_mspi: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_weight_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w1_gamma: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w2_delta: Option<f64>,
}

impl SdagMethodSettings {
    fn with_delta_factor(weight_in_mspi: f64) -> Self {
        Self {
            enabled: true,
            weight_in_mspi,
            delta_weight_factor: Some(0.5),
            w1_gamma: None,
            w2_delta: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DagMethodologies {
    pub enabled: Vec<String>,
    pub multiplicative: SdagMethodSettings,
    pub directional: SdagMethodSettings,
    pub weighted: SdagMethodSettings,
    pub volatility_focused: SdagMethodSettings,
    pub min_agreement_for_conviction_signal: usize,
}

impl Default for DagMethodologies {
    fn default() -> Self {
        Self {
            enabled: SdagMethod::ALL.iter().map(|m| m.name().to_string()).collect(),
            multiplicative: SdagMethodSettings::with_delta_factor(0.1),
            directional: SdagMethodSettings::with_delta_factor(0.0),
            weighted: SdagMethodSettings {
                enabled: true,
                weight_in_mspi: 0.1,
                delta_weight_factor: None,
                w1_gamma: Some(0.6),
                w2_delta: Some(0.4),
            },
            volatility_focused: SdagMethodSettings::with_delta_factor(0.1),
            min_agreement_for_conviction_signal: 2,
        }
    }
}

impl DagMethodologies {
    #[must_use]
    pub fn settings(&self, method: SdagMethod) -> &SdagMethodSettings {
        match method {
            SdagMethod::Multiplicative => &self.multiplicative,
            SdagMethod::Directional => &self.directional,
            SdagMethod::Weighted => &self.weighted,
            SdagMethod::VolatilityFocused => &self.volatility_focused,
        }
    }

    /// Methods listed in `enabled` whose own `enabled` flag is set, in list order.
    #[must_use]
    pub fn active_methods(&self) -> Vec<SdagMethod> {
        let mut methods = Vec::new();
        for name in &self.enabled {
            match SdagMethod::from_name(name) {
                Some(method) if self.settings(method).enabled => {
                    if !methods.contains(&method) {
                        methods.push(method);
                    }
                }
                Some(_) => {}
                None => tracing::warn!(method = %name, "Unknown SDAG methodology in enabled list"),
            }
        }
        methods
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationSettings {
    pub min_directional_stars_to_issue: u8,
    pub min_volatility_stars_to_issue: u8,
    pub min_pinrisk_stars_to_issue: u8,
    pub min_caution_stars_to_issue: u8,
    pub min_reissue_time_seconds: i64,
    pub conviction_map_high: f64,
    pub conviction_map_high_medium: f64,
    pub conviction_map_medium: f64,
    pub conviction_map_medium_low: f64,
    pub conviction_map_base_one_star: f64,
    pub conv_mod_ssi_low: f64,
    pub conv_mod_ssi_high: f64,
    pub conv_mod_vol_expansion: f64,
    pub conv_mod_sdag_align: f64,
    pub conv_mod_sdag_oppose: f64,
    /// Weight of |composite score| in the directional conviction score.
    pub directional_mspi_scale: f64,
    /// Weight of |sai| in the directional conviction score.
    pub directional_sai_scale: f64,
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self {
            min_directional_stars_to_issue: 2,
            min_volatility_stars_to_issue: 2,
            min_pinrisk_stars_to_issue: 2,
            min_caution_stars_to_issue: 2,
            min_reissue_time_seconds: 300,
            conviction_map_high: 4.0,
            conviction_map_high_medium: 3.0,
            conviction_map_medium: 2.0,
            conviction_map_medium_low: 1.0,
            conviction_map_base_one_star: 0.5,
            conv_mod_ssi_low: -1.0,
            conv_mod_ssi_high: 0.25,
            conv_mod_vol_expansion: -0.5,
            conv_mod_sdag_align: 0.75,
            conv_mod_sdag_oppose: -1.0,
            directional_mspi_scale: 2.5,
            directional_sai_scale: 1.5,
        }
    }
}

impl RecommendationSettings {
    /// Star cutoffs for 5, 4, 3, 2 and 1 stars.
    #[must_use]
    pub fn star_cutoffs(&self) -> [f64; 5] {
        [
            self.conviction_map_high,
            self.conviction_map_high_medium,
            self.conviction_map_medium,
            self.conviction_map_medium_low,
            self.conviction_map_base_one_star,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitSettings {
    pub contradiction_stars_threshold: u8,
    pub ssi_exit_stars_threshold: u8,
    /// Fraction of the entry composite score the opposite-signed current
    /// score must reach to force an exit.
    pub mspi_flip_threshold: f64,
    pub arfi_exit_stars_threshold: u8,
}

impl Default for ExitSettings {
    fn default() -> Self {
        Self {
            contradiction_stars_threshold: 4,
            ssi_exit_stars_threshold: 3,
            mspi_flip_threshold: 0.7,
            arfi_exit_stars_threshold: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetSettings {
    pub min_target_atr_distance: f64,
    pub nvp_support_quantile: f64,
    pub nvp_resistance_quantile: f64,
    pub target_atr_stop_loss_multiplier: f64,
    pub target_atr_target1_multiplier_no_sr: f64,
    pub target_atr_target2_multiplier_no_sr: f64,
    pub target_atr_target2_multiplier_from_t1: f64,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            min_target_atr_distance: 0.75,
            nvp_support_quantile: 0.90,
            nvp_resistance_quantile: 0.10,
            target_atr_stop_loss_multiplier: 1.5,
            target_atr_target1_multiplier_no_sr: 2.0,
            target_atr_target2_multiplier_no_sr: 3.5,
            target_atr_target2_multiplier_from_t1: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    pub gamma_exposure_source_col: String,
    pub delta_exposure_source_col: String,
    pub skew_adjusted_gamma_source_col: String,
    pub use_skew_adjusted_for_sdag: bool,
    pub direct_delta_buy_col: String,
    pub direct_delta_sell_col: String,
    pub direct_gamma_buy_col: String,
    pub direct_gamma_sell_col: String,
    pub direct_vega_buy_col: String,
    pub direct_vega_sell_col: String,
    pub direct_theta_buy_col: String,
    pub direct_theta_sell_col: String,
    pub proxy_delta_flow_col: String,
    pub proxy_gamma_flow_col: String,
    pub proxy_vega_flow_col: String,
    pub proxy_theta_flow_col: String,
    pub proxy_charm_flow_col: String,
    pub proxy_vanna_flow_col: String,
    pub proxy_vomma_flow_col: String,
    #[serde(deserialize_with = "lenient_thresholds")]
    pub thresholds: BTreeMap<String, ThresholdSpec>,
    pub dag_methodologies: DagMethodologies,
    pub recommendations: RecommendationSettings,
    pub exits: ExitSettings,
    pub targets: TargetSettings,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            gamma_exposure_source_col: "gxoi".to_string(),
            delta_exposure_source_col: "dxoi".to_string(),
            skew_adjusted_gamma_source_col: "sgxoi".to_string(),
            use_skew_adjusted_for_sdag: false,
            direct_delta_buy_col: "deltas_buy".to_string(),
            direct_delta_sell_col: "deltas_sell".to_string(),
            direct_gamma_buy_col: "gammas_buy".to_string(),
            direct_gamma_sell_col: "gammas_sell".to_string(),
            direct_vega_buy_col: "vegas_buy".to_string(),
            direct_vega_sell_col: "vegas_sell".to_string(),
            direct_theta_buy_col: "thetas_buy".to_string(),
            direct_theta_sell_col: "thetas_sell".to_string(),
            proxy_delta_flow_col: "dxvolm".to_string(),
            proxy_gamma_flow_col: "gxvolm".to_string(),
            proxy_vega_flow_col: "vxvolm".to_string(),
            proxy_theta_flow_col: "txvolm".to_string(),
            proxy_charm_flow_col: "charmxvolm".to_string(),
            proxy_vanna_flow_col: "vannaxvolm".to_string(),
            proxy_vomma_flow_col: "vommaxvolm".to_string(),
            thresholds: default_thresholds(),
            dag_methodologies: DagMethodologies::default(),
            recommendations: RecommendationSettings::default(),
            exits: ExitSettings::default(),
            targets: TargetSettings::default(),
        }
    }
}

impl StrategySettings {
    /// Gamma column the SDAG formulas should read.
    #[must_use]
    pub fn sdag_gamma_column(&self) -> &str {
        if self.use_skew_adjusted_for_sdag {
            &self.skew_adjusted_gamma_source_col
        } else {
            &self.gamma_exposure_source_col
        }
    }

    /// Exposure and flow columns every contract row must carry as numbers.
    #[must_use]
    pub fn contract_exposure_columns(&self) -> Vec<String> {
        [
            &self.gamma_exposure_source_col,
            &self.delta_exposure_source_col,
            &self.direct_delta_buy_col,
            &self.direct_delta_sell_col,
            &self.direct_gamma_buy_col,
            &self.direct_gamma_sell_col,
            &self.direct_vega_buy_col,
            &self.direct_vega_sell_col,
            &self.direct_theta_buy_col,
            &self.direct_theta_sell_col,
            &self.proxy_delta_flow_col,
            &self.proxy_gamma_flow_col,
            &self.proxy_vega_flow_col,
            &self.proxy_theta_flow_col,
            &self.proxy_charm_flow_col,
            &self.proxy_vanna_flow_col,
            &self.proxy_vomma_flow_col,
        ]
        .into_iter()
        .cloned()
        .collect()
    }
}

// ============================================
// Validation settings
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub required_top_level_sections: Vec<String>,
    pub weights_sum_tolerance: f64,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            required_top_level_sections: vec![
                "system_settings".to_string(),
                "data_processor_settings".to_string(),
                "strategy_settings".to_string(),
            ],
            weights_sum_tolerance: 0.01,
        }
    }
}
