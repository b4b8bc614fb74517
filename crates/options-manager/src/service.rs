//! Cycle service: runs the full scoring pipeline for one symbol snapshot
//! and feeds the result into the recommendation lifecycle.
//!
//! Pipeline per cycle:
//! 1. Repair the contract rows' exposure columns
//! 2. Aggregate contracts to per-strike levels
//! 3. Select component weights and blend the composite score
//! 4. Identify key levels and generate signals
//! 5. Estimate ATR
//! 6. Run the recommendation lifecycle

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveTime, Utc};
use mspi_core::{ensure_columns, AppConfig, ConfigStore, Table};
use mspi_signals::{
    AtrEstimator, CompositeScorer, KeyLevels, LevelAggregator, LevelFinder, SignalGenerator,
    TradingSignals, WeightSelection, WeightSelector,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::manager::{CycleSnapshot, LifecycleUpdate, RecommendationManager};
use crate::types::Recommendation;

const GROUP_COLUMN: &str = "strike";

/// One market snapshot for one symbol.
#[derive(Debug, Clone)]
pub struct CycleInput {
    pub symbol: String,
    pub contracts: Table,
    /// Underlying price; when absent the per-strike `price` column is used.
    pub price: Option<f64>,
    /// Session time for time-of-day weights.
    pub time: NaiveTime,
    pub timestamp: DateTime<Utc>,
    pub iv_context: Option<HashMap<String, f64>>,
    /// OHLC bars for ATR.
    pub history_bars: Option<Table>,
}

#[derive(Deserialize)]
struct RawCycleInput {
    symbol: String,
    contracts: Value,
    #[serde(default)]
    price: Option<f64>,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    time: Option<NaiveTime>,
    #[serde(default)]
    iv_context: Option<HashMap<String, f64>>,
    #[serde(default)]
    history: Option<Value>,
}

impl CycleInput {
    /// Parses a snapshot document: `symbol`, `timestamp` (RFC 3339) and
    /// `contracts` (row objects or column arrays) are required; `price`,
    /// `time` (`HH:MM:SS`, default the timestamp's time), `iv_context` and
    /// `history` are optional.
    ///
    /// # Errors
    ///
    /// Returns an error when a required field is missing or a table is not
    /// tabular.
    pub fn from_json(value: &Value) -> Result<Self> {
        let raw: RawCycleInput =
            serde_json::from_value(value.clone()).context("Invalid cycle input document")?;
        let contracts = Table::from_json(&raw.contracts)
            .with_context(|| format!("Contract rows for {} are not tabular", raw.symbol))?;
        let history_bars = raw
            .history
            .as_ref()
            .map(Table::from_json)
            .transpose()
            .with_context(|| format!("OHLC history for {} is not tabular", raw.symbol))?;

        Ok(Self {
            time: raw.time.unwrap_or_else(|| raw.timestamp.time()),
            symbol: raw.symbol,
            contracts,
            price: raw.price,
            timestamp: raw.timestamp,
            iv_context: raw.iv_context,
            history_bars,
        })
    }

    /// Reads and parses a snapshot document from disk.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cycle input {}", path.display()))?;
        let value: Value = serde_json::from_str(&text)
            .with_context(|| format!("Cycle input {} is not valid JSON", path.display()))?;
        Self::from_json(&value)
    }
}

/// Per-strike analysis of one snapshot, before any lifecycle state.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    #[serde(skip)]
    pub levels: Table,
    pub strikes: usize,
    pub weights: WeightSelection,
    pub signals: TradingSignals,
    pub key_levels: KeyLevels,
    pub price: Option<f64>,
    pub atr: f64,
    /// Contract rows needed column repair.
    pub schema_repaired: bool,
}

/// Everything one cycle produced.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    /// Active recommendations after the cycle, ordered by id.
    pub active: Vec<Recommendation>,
    /// Recommendations that exited this cycle, with their reasons.
    pub exited: Vec<Recommendation>,
    pub issued: Vec<u64>,
    pub adjusted: Vec<u64>,
    pub signals: TradingSignals,
    pub key_levels: KeyLevels,
    pub weights: WeightSelection,
    pub price: Option<f64>,
    pub atr: f64,
    pub strikes: usize,
    /// Price or ATR unusable; recommendations were left unchanged.
    pub degraded: bool,
    pub schema_repaired: bool,
}

/// Owns the configured pipeline and one recommendation manager.
pub struct ConvictionEngine {
    config: AppConfig,
    selector: WeightSelector,
    aggregator: LevelAggregator,
    level_finder: LevelFinder,
    atr: AtrEstimator,
    generator: SignalGenerator,
    manager: RecommendationManager,
}

impl ConvictionEngine {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        tracing::info!(
            version = %config.version,
            history = config.system_settings.history_capacity(),
            "Conviction engine configured"
        );
        Self {
            selector: WeightSelector::new(&config),
            aggregator: LevelAggregator::new(&config),
            level_finder: LevelFinder::new(&config),
            atr: AtrEstimator::new(&config),
            generator: SignalGenerator::new(&config),
            manager: RecommendationManager::from_app(&config),
            config,
        }
    }

    #[must_use]
    pub fn from_store(store: &ConfigStore) -> Self {
        Self::new(store.config().clone())
    }

    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub const fn manager(&self) -> &RecommendationManager {
        &self.manager
    }

    /// Runs the scoring pipeline without touching lifecycle state.
    #[must_use]
    pub fn analyze(&self, input: &CycleInput) -> Analysis {
        let symbol = input.symbol.as_str();
        let (mut levels, schema_repaired) = self.levels(input);

        let weights = self.selector.select(input.time, input.iv_context.as_ref());
        CompositeScorer::apply(&mut levels, &weights);

        let key_levels = self.level_finder.identify(&levels, self.generator.thresholds());
        let price = input
            .price
            .filter(|p| p.is_finite() && *p > 0.0)
            .or_else(|| level_price(&levels));
        let signals = self.generator.generate(&levels, price);
        let atr = self.atr.estimate(symbol, price, input.history_bars.as_ref());

        tracing::debug!(
            symbol,
            strikes = levels.len(),
            signals = signals.len(),
            atr,
            "Snapshot analyzed"
        );
        Analysis {
            strikes: levels.len(),
            levels,
            weights,
            signals,
            key_levels,
            price,
            atr,
            schema_repaired,
        }
    }

    /// Runs one full cycle and updates the live recommendations.
    pub fn run_cycle(&mut self, input: &CycleInput) -> CycleReport {
        let analysis = self.analyze(input);
        let update = self.manager.evaluate(&snapshot_for(input, &analysis));
        report(input, analysis, update)
    }

    /// What a fresh manager would issue for `input` right now. Live state
    /// is not touched.
    #[must_use]
    pub fn snapshot(&self, input: &CycleInput) -> Vec<Recommendation> {
        let analysis = self.analyze(input);
        let mut scratch = RecommendationManager::from_app(&self.config);
        scratch.evaluate(&snapshot_for(input, &analysis)).active
    }

    fn levels(&self, input: &CycleInput) -> (Table, bool) {
        if input.contracts.is_empty() {
            tracing::warn!(symbol = %input.symbol, "No contract rows this cycle");
            return (Table::default(), false);
        }
        if !input.contracts.has_column(GROUP_COLUMN) {
            tracing::error!(symbol = %input.symbol, column = GROUP_COLUMN, "Contract rows have no strike column");
            return (Table::default(), true);
        }
        let required = self.config.strategy_settings.contract_exposure_columns();
        let (contracts, valid) = ensure_columns(input.contracts.clone(), &required, "contract rows");
        (self.aggregator.aggregate(&contracts, GROUP_COLUMN), !valid)
    }
}

fn level_price(levels: &Table) -> Option<f64> {
    levels
        .numeric("price")?
        .into_iter()
        .find(|p| p.is_finite() && *p > 0.0)
}

fn snapshot_for<'a>(input: &'a CycleInput, analysis: &'a Analysis) -> CycleSnapshot<'a> {
    CycleSnapshot {
        symbol: &input.symbol,
        price: analysis.price,
        atr: Some(analysis.atr),
        levels: &analysis.levels,
        signals: &analysis.signals,
        key_levels: &analysis.key_levels,
        timestamp: input.timestamp,
    }
}

fn report(input: &CycleInput, analysis: Analysis, update: LifecycleUpdate) -> CycleReport {
    CycleReport {
        symbol: input.symbol.clone(),
        timestamp: input.timestamp,
        active: update.active,
        exited: update.exited,
        issued: update.issued,
        adjusted: update.adjusted,
        signals: analysis.signals,
        key_levels: analysis.key_levels,
        weights: analysis.weights,
        price: analysis.price,
        atr: analysis.atr,
        strikes: analysis.strikes,
        degraded: update.degraded,
        schema_repaired: analysis.schema_repaired,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "symbol": "SPY",
            "timestamp": "2024-03-01T15:30:00Z",
            "price": 100.0,
            "contracts": [
                {"strike": 95.0, "mspi": 0.4, "sai": 0.2},
                {"strike": 100.0, "mspi": 0.8, "sai": 0.9},
                {"strike": 100.0, "mspi": 0.1, "sai": 0.9},
                {"strike": 105.0, "mspi": -0.3, "sai": -0.1}
            ]
        })
    }

    #[test]
    fn parses_minimal_document() {
        let input = CycleInput::from_json(&document()).unwrap();
        assert_eq!(input.symbol, "SPY");
        assert_eq!(input.contracts.len(), 4);
        assert_eq!(input.time, NaiveTime::from_hms_opt(15, 30, 0).unwrap());
        assert!(input.history_bars.is_none());
    }

    #[test]
    fn rejects_non_tabular_contracts() {
        let mut doc = document();
        doc["contracts"] = json!(42);
        assert!(CycleInput::from_json(&doc).is_err());
    }

    #[test]
    fn missing_symbol_is_an_error() {
        let mut doc = document();
        doc.as_object_mut().unwrap().remove("symbol");
        assert!(CycleInput::from_json(&doc).is_err());
    }

    #[test]
    fn analysis_aggregates_by_strike() {
        let engine = ConvictionEngine::new(AppConfig::default());
        let input = CycleInput::from_json(&document()).unwrap();
        let analysis = engine.analyze(&input);
        assert_eq!(analysis.strikes, 3);
        assert!(analysis.schema_repaired);
        // no OHLC history: 0.5% of 100 floored to 1.0
        assert_eq!(analysis.atr, 1.0);
    }

    #[test]
    fn missing_strike_column_yields_no_levels() {
        let engine = ConvictionEngine::new(AppConfig::default());
        let mut input = CycleInput::from_json(&document()).unwrap();
        input.contracts.remove_column("strike");
        let analysis = engine.analyze(&input);
        assert_eq!(analysis.strikes, 0);
        assert!(analysis.signals.is_empty());
    }
}
