//! End-to-end cycles through the conviction engine: issue, adjust, exit on
//! contradiction, degraded cycles and stateless snapshots.

use mspi_core::{AppConfig, ConfigStore};
use mspi_options_manager::{
    ConvictionEngine, CycleInput, ExitReason, RecommendationCategory, RecommendationStatus,
};
use mspi_signals::{Bias, SignalCategory};
use serde_json::{json, Value};

const SYMBOL: &str = "SPY";

fn document(timestamp: &str, price: Option<f64>, composite_at_450: f64) -> Value {
    let mut doc = json!({
        "symbol": SYMBOL,
        "timestamp": timestamp,
        "contracts": {
            "strike": [445.0, 450.0, 450.0, 455.0],
            "mspi":   [0.2, composite_at_450 / 2.0, composite_at_450 / 2.0, -0.1],
            "sai":    [0.3, 0.9, 0.9, 0.2]
        }
    });
    if let Some(price) = price {
        doc["price"] = json!(price);
    }
    doc
}

fn input(timestamp: &str, price: Option<f64>, composite_at_450: f64) -> CycleInput {
    CycleInput::from_json(&document(timestamp, price, composite_at_450)).unwrap()
}

// ============================================
// Full lifecycle
// ============================================

#[test]
fn issue_adjust_and_exit_on_contradiction() {
    let mut engine = ConvictionEngine::new(AppConfig::default());

    // 2.5 * 0.8 + 1.5 * 0.9 = 3.35 -> 4 stars
    let first = engine.run_cycle(&input("2024-03-01T15:00:00Z", Some(450.0), 0.8));
    assert!(!first.degraded);
    assert_eq!(first.strikes, 3);
    assert_eq!(first.issued, vec![1]);
    let rec = &first.active[0];
    assert_eq!(rec.category, RecommendationCategory::Directional);
    assert_eq!(rec.signal_category, SignalCategory::Directional);
    assert_eq!(rec.bias, Bias::Bullish);
    assert_eq!(rec.stars, 4);
    assert_eq!(rec.anchor_strike, 450.0);
    // ATR falls back to 0.5% of price; resistance at 455 is target 1
    assert!((first.atr - 2.25).abs() < 1e-9);
    assert!((rec.stop_loss - 446.625).abs() < 1e-9);
    assert_eq!(rec.target_1, 455.0);
    assert!((rec.target_2 - 459.5).abs() < 1e-9);

    // Stronger composite re-scores the same recommendation
    let second = engine.run_cycle(&input("2024-03-01T15:01:00Z", Some(451.0), 0.9));
    assert!(second.issued.is_empty());
    assert_eq!(second.adjusted, vec![1]);
    let rec = &second.active[0];
    assert_eq!(rec.status, RecommendationStatus::Adjusted);
    assert!((rec.conviction_score - 3.6).abs() < 1e-9);
    assert_eq!(rec.entry_price, 450.0);

    // Composite flips bearish at the anchor with conviction
    let third = engine.run_cycle(&input("2024-03-01T15:02:00Z", Some(451.0), -0.7));
    assert_eq!(third.exited.len(), 1);
    assert_eq!(third.exited[0].id, 1);
    assert_eq!(third.exited[0].exit_reason, Some(ExitReason::Contradiction));
    assert_eq!(third.issued, vec![2]);
    assert_eq!(third.active.len(), 1);
    assert_eq!(third.active[0].bias, Bias::Bearish);
}

#[test]
fn missing_price_is_a_degraded_cycle() {
    let mut engine = ConvictionEngine::new(AppConfig::default());
    engine.run_cycle(&input("2024-03-01T15:00:00Z", Some(450.0), 0.8));

    let report = engine.run_cycle(&input("2024-03-01T15:01:00Z", None, -0.9));
    assert!(report.degraded);
    assert!(report.exited.is_empty());
    assert_eq!(report.active.len(), 1);
    assert_eq!(report.active[0].id, 1);
    assert_eq!(report.active[0].status, RecommendationStatus::Active);
}

#[test]
fn report_serializes_for_callers() {
    let mut engine = ConvictionEngine::new(AppConfig::default());
    let report = engine.run_cycle(&input("2024-03-01T15:00:00Z", Some(450.0), 0.8));
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["active"][0]["category"], "directional");
    assert_eq!(value["active"][0]["status"], "active");
    assert_eq!(value["weights"]["source"]["policy"], "time_based");
}

// ============================================
// Snapshot and configuration
// ============================================

#[test]
fn snapshot_leaves_live_state_alone() {
    let engine = ConvictionEngine::new(AppConfig::default());
    let recs = engine.snapshot(&input("2024-03-01T15:00:00Z", Some(450.0), 0.8));
    assert_eq!(recs.len(), 1);
    assert!(engine.manager().active(SYMBOL).is_empty());
}

#[test]
fn configured_minimum_stars_gate_issuance() {
    let overlay = json!({
        "strategy_settings": {
            "recommendations": { "min_directional_stars_to_issue": 5 }
        }
    });
    let store = ConfigStore::with_override(overlay.as_object().cloned());
    let mut engine = ConvictionEngine::from_store(&store);
    let report = engine.run_cycle(&input("2024-03-01T15:00:00Z", Some(450.0), 0.8));
    assert!(report.active.is_empty());
    assert_eq!(report.signals.get(SignalCategory::Directional).len(), 1);
}
