//! Stateful recommendation lifecycle: issue, adjust and exit across cycles.
//!
//! Each cycle for a symbol runs in a fixed order:
//! 1. Record the per-strike snapshot in the symbol's history
//! 2. Validate price and ATR; without both the cycle is degraded and
//!    recommendations are left untouched
//! 3. Check exit rules on every active recommendation
//! 4. Re-score and re-target the survivors
//! 5. Issue the best qualifying candidate per category, respecting the
//!    re-issue cooldown
//!
//! The manager is not thread-safe. One instance owns its recommendations;
//! callers serialize cycles per symbol.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use mspi_core::{AppConfig, Table};
use mspi_signals::{Bias, KeyLevels, SignalRecord, StarMapper, TradingSignals};
use serde::Serialize;

use crate::exits::check_exit_rules;
use crate::history::{HistoryBuffer, LevelSnapshot};
use crate::monitor::{adjust, MarketView};
use crate::targets::compute_targets;
use crate::types::{
    ExitReason, ManagerConfig, Recommendation, RecommendationCategory, RecommendationStatus,
};

type Key = (String, RecommendationCategory);

/// Market inputs of one cycle for one symbol.
#[derive(Debug, Clone, Copy)]
pub struct CycleSnapshot<'a> {
    pub symbol: &'a str,
    pub price: Option<f64>,
    pub atr: Option<f64>,
    /// Per-strike table carrying `strike` and the composite score.
    pub levels: &'a Table,
    pub signals: &'a TradingSignals,
    pub key_levels: &'a KeyLevels,
    pub timestamp: DateTime<Utc>,
}

/// What one cycle did to a symbol's recommendations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LifecycleUpdate {
    /// Active recommendations after the cycle, ordered by id.
    pub active: Vec<Recommendation>,
    /// Recommendations that left the active set this cycle.
    pub exited: Vec<Recommendation>,
    pub issued: Vec<u64>,
    pub adjusted: Vec<u64>,
    /// Price or ATR was unusable; nothing was changed.
    pub degraded: bool,
}

#[derive(Debug)]
pub struct RecommendationManager {
    config: ManagerConfig,
    stars: StarMapper,
    active: BTreeMap<Key, Recommendation>,
    history: HashMap<String, HistoryBuffer<LevelSnapshot>>,
    next_id: u64,
}

impl RecommendationManager {
    #[must_use]
    pub fn new(config: ManagerConfig, stars: StarMapper) -> Self {
        Self {
            config,
            stars,
            active: BTreeMap::new(),
            history: HashMap::new(),
            next_id: 1,
        }
    }

    #[must_use]
    pub fn from_app(config: &AppConfig) -> Self {
        Self::new(
            ManagerConfig::from_app(config),
            StarMapper::new(&config.strategy_settings.recommendations),
        )
    }

    #[must_use]
    pub const fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Active recommendations for `symbol`, ordered by id.
    #[must_use]
    pub fn active(&self, symbol: &str) -> Vec<Recommendation> {
        let mut out: Vec<Recommendation> = self
            .active
            .iter()
            .filter(|((s, _), _)| s == symbol)
            .map(|(_, rec)| rec.clone())
            .collect();
        out.sort_by_key(|r| r.id);
        out
    }

    #[must_use]
    pub fn get(&self, symbol: &str, category: RecommendationCategory) -> Option<&Recommendation> {
        self.active.get(&(symbol.to_string(), category))
    }

    #[must_use]
    pub fn history(&self, symbol: &str) -> Option<&HistoryBuffer<LevelSnapshot>> {
        self.history.get(symbol)
    }

    /// Runs one lifecycle cycle for `snapshot.symbol`.
    pub fn evaluate(&mut self, snapshot: &CycleSnapshot<'_>) -> LifecycleUpdate {
        let symbol = snapshot.symbol;
        let current = LevelSnapshot::from_levels(snapshot.levels, snapshot.timestamp).unwrap_or_else(|| {
            tracing::warn!(symbol, "Per-strike table has no strike column");
            LevelSnapshot {
                timestamp: snapshot.timestamp,
                strikes: Vec::new(),
                composite: Vec::new(),
            }
        });
        let capacity = self.config.history_capacity;
        let history = self
            .history
            .entry(symbol.to_string())
            .or_insert_with(|| HistoryBuffer::new(capacity));
        history.push(current.clone());

        let (Some(price), Some(atr)) = (positive(snapshot.price), positive(snapshot.atr)) else {
            tracing::warn!(
                symbol,
                price = ?snapshot.price,
                atr = ?snapshot.atr,
                "Degraded cycle: missing price or ATR, recommendations unchanged"
            );
            return LifecycleUpdate {
                active: self.active(symbol),
                degraded: true,
                ..LifecycleUpdate::default()
            };
        };

        let view = MarketView {
            symbol,
            price,
            atr,
            strikes: &current.strikes,
            composite: &current.composite,
            signals: snapshot.signals,
            key_levels: snapshot.key_levels,
            now: snapshot.timestamp,
        };
        let mut update = LifecycleUpdate::default();

        self.apply_exits(&view, &mut update);
        self.apply_adjustments(&view, &mut update);
        self.issue(&view, &mut update);

        update.active = self.active(symbol);
        tracing::info!(
            symbol,
            active = update.active.len(),
            issued = update.issued.len(),
            exited = update.exited.len(),
            adjusted = update.adjusted.len(),
            "Recommendation cycle complete"
        );
        update
    }

    fn keys_for(&self, symbol: &str) -> Vec<Key> {
        self.active
            .keys()
            .filter(|(s, _)| s == symbol)
            .cloned()
            .collect()
    }

    fn apply_exits(&mut self, view: &MarketView<'_>, update: &mut LifecycleUpdate) {
        for key in self.keys_for(view.symbol) {
            let reason = self
                .active
                .get(&key)
                .and_then(|rec| check_exit_rules(rec, view, &self.config.exits));
            if let Some(reason) = reason {
                if let Some(rec) = self.retire(&key, reason, view.now) {
                    update.exited.push(rec);
                }
            }
        }
    }

    fn apply_adjustments(&mut self, view: &MarketView<'_>, update: &mut LifecycleUpdate) {
        let history = self.history.get(view.symbol);
        for ((symbol, _), rec) in &mut self.active {
            if symbol != view.symbol {
                continue;
            }
            rec.composite_trend = history.and_then(|h| h.composite_trend(rec.anchor_strike));
            if adjust(rec, view, &self.stars, &self.config.targets) {
                update.adjusted.push(rec.id);
            }
        }
    }

    fn issue(&mut self, view: &MarketView<'_>, update: &mut LifecycleUpdate) {
        let cooldown = self.config.reissue_cooldown_seconds();
        for category in RecommendationCategory::ALL {
            let min_stars = category.min_stars(&self.config.recommendations);
            let Some(candidate) = best_candidate(view, category, min_stars) else {
                continue;
            };

            let key = (view.symbol.to_string(), category);
            if let Some(existing) = self.active.get(&key) {
                let age = existing.age_seconds(view.now);
                if age < cooldown {
                    tracing::debug!(
                        symbol = view.symbol,
                        category = %category,
                        id = existing.id,
                        age,
                        cooldown,
                        "Within re-issue cooldown, keeping existing recommendation"
                    );
                    continue;
                }
                if existing.bias == candidate.bias && existing.anchor_strike == candidate.strike {
                    continue;
                }
                if let Some(old) = self.retire(&key, ExitReason::Superseded, view.now) {
                    update.exited.push(old);
                }
            }

            let rec = self.build(view, category, candidate);
            tracing::info!(
                symbol = view.symbol,
                id = rec.id,
                category = %category,
                signal = %rec.signal_category,
                bias = %rec.bias,
                stars = rec.stars,
                entry = rec.entry_price,
                stop_loss = rec.stop_loss,
                target_1 = rec.target_1,
                target_2 = rec.target_2,
                "Issued recommendation"
            );
            update.issued.push(rec.id);
            self.active.insert(key, rec);
        }
    }

    fn build(
        &mut self,
        view: &MarketView<'_>,
        category: RecommendationCategory,
        candidate: &SignalRecord,
    ) -> Recommendation {
        let id = self.next_id;
        self.next_id += 1;

        let direction = match category {
            RecommendationCategory::Volatility => match Bias::from_sign(candidate.composite) {
                Bias::Neutral => Bias::Bullish,
                price_bias => price_bias,
            },
            _ => candidate.bias,
        };
        let targets = compute_targets(direction, view.price, view.atr, view.key_levels, &self.config.targets);
        let history = self.history.get(view.symbol);

        Recommendation {
            id,
            symbol: view.symbol.to_string(),
            category,
            signal_category: candidate.category,
            bias: candidate.bias,
            direction,
            stars: candidate.stars,
            conviction_score: candidate.score,
            entry_conviction: candidate.score,
            entry_price: view.price,
            stop_loss: targets.stop_loss,
            target_1: targets.target_1,
            target_2: targets.target_2,
            anchor_strike: candidate.strike,
            entry_composite: candidate.composite,
            last_composite: candidate.composite,
            composite_trend: history.and_then(|h| h.composite_trend(candidate.strike)),
            issued_at: view.now,
            updated_at: view.now,
            status: RecommendationStatus::Active,
            exit_reason: None,
            adjustments: 0,
        }
    }

    /// Removes a recommendation from the active set and stamps its exit.
    fn retire(&mut self, key: &Key, reason: ExitReason, now: DateTime<Utc>) -> Option<Recommendation> {
        let mut rec = self.active.remove(key)?;
        rec.status = RecommendationStatus::Exited;
        rec.exit_reason = Some(reason);
        rec.updated_at = now;
        tracing::info!(
            symbol = %rec.symbol,
            id = rec.id,
            category = %rec.category,
            reason = %reason,
            "Recommendation exited"
        );
        Some(rec)
    }
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

/// Highest stars, then highest score, then the strike nearest the price.
/// Neutral-bias signals never issue.
fn best_candidate<'a>(
    view: &MarketView<'a>,
    category: RecommendationCategory,
    min_stars: u8,
) -> Option<&'a SignalRecord> {
    let signals: &'a TradingSignals = view.signals;
    let price = view.price;
    category
        .signal_categories()
        .iter()
        .flat_map(|&c| signals.get(c))
        .filter(|r| r.bias != Bias::Neutral && r.stars >= min_stars.max(1))
        .min_by(|a, b| {
            b.stars
                .cmp(&a.stars)
                .then_with(|| b.score.total_cmp(&a.score))
                .then_with(|| (a.strike - price).abs().total_cmp(&(b.strike - price).abs()))
        })
}
