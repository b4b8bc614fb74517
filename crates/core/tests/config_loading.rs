//! End-to-end configuration loading from files on disk.

use std::io::Write;

use mspi_core::{ConfigLoader, ConfigStore, SelectionLogic, ThresholdSpec};
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn missing_path_uses_defaults() {
    let store = ConfigLoader::load(Some(std::path::Path::new("/no/such/config.json")));
    let defaults = ConfigStore::from_defaults();
    assert_eq!(store.merged(), defaults.merged());
}

#[test]
fn no_path_uses_defaults() {
    let store = ConfigLoader::load(None);
    assert_eq!(
        store.config().strategy_settings.recommendations.min_reissue_time_seconds,
        300
    );
}

#[test]
fn malformed_file_degrades_to_defaults() {
    let file = write_config("{ \"system_settings\": ");
    let store = ConfigLoader::load(Some(file.path()));
    assert_eq!(store.config().system_settings.log_level, "INFO");
    assert!(store.missing_sections().is_empty());
}

#[test]
fn partial_override_merges_leaves() {
    let file = write_config(
        r#"{
            "data_processor_settings": {
                "weights": {
                    "selection_logic": "volatility_based",
                    "volatility_based": { "iv_percentile_threshold": 35 }
                }
            },
            "strategy_settings": {
                "dag_methodologies": { "enabled": ["multiplicative"] }
            }
        }"#,
    );
    let store = ConfigLoader::load(Some(file.path()));
    let weights = &store.config().data_processor_settings.weights;
    assert_eq!(weights.selection_logic, SelectionLogic::VolatilityBased);
    assert_eq!(weights.volatility_based.iv_percentile_threshold, 35.0);
    // Sibling leaves keep their built-in values.
    assert_eq!(weights.volatility_based.low_iv["dag_custom"], 0.45);
    assert_eq!(
        store.config().strategy_settings.dag_methodologies.enabled,
        vec!["multiplicative".to_string()]
    );
}

#[test]
fn threshold_override_replaces_single_spec() {
    let file = write_config(
        r#"{
            "strategy_settings": {
                "thresholds": {
                    "sai_high_conviction": { "type": "relative_percentile", "percentile": 90 }
                }
            }
        }"#,
    );
    let store = ConfigLoader::load(Some(file.path()));
    let thresholds = &store.config().strategy_settings.thresholds;
    assert!(matches!(
        thresholds.get("sai_high_conviction"),
        Some(ThresholdSpec::RelativePercentile { percentile, .. }) if *percentile == 90.0
    ));
    assert!(thresholds.contains_key("ssi_structure_change"));
}

#[test]
fn nulled_section_is_reported_but_not_fatal() {
    let file = write_config(r#"{ "system_settings": null }"#);
    let store = ConfigLoader::load(Some(file.path()));
    assert_eq!(store.missing_sections(), ["system_settings".to_string()]);
    assert_eq!(store.config().system_settings.history_capacity(), 5);
}
