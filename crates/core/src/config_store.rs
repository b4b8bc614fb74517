//! Immutable session configuration with path-based lookup.
//!
//! A [`ConfigStore`] holds three views of the same configuration:
//! the merged JSON tree (defaults overlaid with user values), the built-in
//! default tree, and the typed [`AppConfig`] built once from the merged tree.
//! Components read the typed view; [`ConfigStore::get`] serves ad-hoc paths
//! with the merged → built-in → caller-default fallback chain.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::config::AppConfig;
use crate::config_loader::{deep_merge, json_kind};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    merged: Value,
    defaults: Value,
    config: AppConfig,
    missing_sections: Vec<String>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::from_defaults()
    }
}

impl ConfigStore {
    /// A store backed by the built-in defaults only.
    #[must_use]
    pub fn from_defaults() -> Self {
        Self::with_override(None)
    }

    /// Deep-merges `overlay` onto the built-in default tree, validates the
    /// required sections and builds the typed view.
    #[must_use]
    pub fn with_override(overlay: Option<Map<String, Value>>) -> Self {
        let defaults = AppConfig::default().to_tree();
        let merged = match overlay {
            Some(map) => deep_merge(&defaults, &Value::Object(map)),
            None => defaults.clone(),
        };

        let mut store = Self {
            merged,
            defaults,
            config: AppConfig::default(),
            missing_sections: Vec::new(),
        };
        store.missing_sections = store.validate_sections();
        store.config = store.build_typed();
        store
    }

    /// Typed configuration for component constructors.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The merged (defaults + override) tree.
    #[must_use]
    pub fn merged(&self) -> &Value {
        &self.merged
    }

    /// The built-in default tree.
    #[must_use]
    pub fn defaults(&self) -> &Value {
        &self.defaults
    }

    /// Required top-level sections that were absent or null after merging.
    #[must_use]
    pub fn missing_sections(&self) -> &[String] {
        &self.missing_sections
    }

    /// Raw lookup: the merged value at `path`, or the built-in default when the
    /// merged value is absent or null.
    #[must_use]
    pub fn get_value(&self, path: &[&str]) -> Option<&Value> {
        lookup(&self.merged, path)
            .filter(|v| !v.is_null())
            .or_else(|| lookup(&self.defaults, path).filter(|v| !v.is_null()))
    }

    /// Typed lookup with the two-level fallback: merged config, then built-in
    /// defaults, then `default`. A value that does not deserialize into `T`
    /// is treated as absent. Never panics for any path.
    pub fn get<T: DeserializeOwned>(&self, path: &[&str], default: T) -> T {
        for (layer, tree) in [("merged", &self.merged), ("defaults", &self.defaults)] {
            let Some(value) = lookup(tree, path).filter(|v| !v.is_null()) else {
                continue;
            };
            match serde_json::from_value::<T>(value.clone()) {
                Ok(typed) => return typed,
                Err(e) => {
                    tracing::warn!(
                        path = %path.join("."),
                        layer,
                        found = json_kind(value),
                        error = %e,
                        "Config value has unexpected type, falling back"
                    );
                }
            }
        }
        tracing::debug!(path = %path.join("."), "Config path not found, using caller default");
        default
    }

    fn validate_sections(&self) -> Vec<String> {
        let required: Vec<String> = self.get(
            &["validation", "required_top_level_sections"],
            Vec::new(),
        );
        let missing: Vec<String> = required
            .into_iter()
            .filter(|section| {
                self.merged
                    .get(section.as_str())
                    .map_or(true, Value::is_null)
            })
            .collect();
        for section in &missing {
            tracing::error!(section = %section, "Required configuration section missing");
        }
        missing
    }

    fn build_typed(&self) -> AppConfig {
        let healed = heal_nulls(&self.merged, &self.defaults);
        let fallback = AppConfig::default();
        AppConfig {
            version: section(&healed, "version", fallback.version),
            system_settings: section(&healed, "system_settings", fallback.system_settings),
            data_processor_settings: section(
                &healed,
                "data_processor_settings",
                fallback.data_processor_settings,
            ),
            strategy_settings: section(&healed, "strategy_settings", fallback.strategy_settings),
            visualization_settings: healed
                .get("visualization_settings")
                .cloned()
                .unwrap_or(fallback.visualization_settings),
            validation: section(&healed, "validation", fallback.validation),
        }
    }
}

fn lookup<'a>(tree: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(tree, |node, key| match node {
        Value::Object(map) => map.get(*key),
        _ => None,
    })
}

/// Replaces null leaves of `tree` with the value at the same path in
/// `defaults`, where one exists.
fn heal_nulls(tree: &Value, defaults: &Value) -> Value {
    match (tree, defaults) {
        (Value::Null, fallback) => fallback.clone(),
        (Value::Object(map), Value::Object(default_map)) => Value::Object(
            map.iter()
                .map(|(key, value)| {
                    let healed = match default_map.get(key) {
                        Some(default) => heal_nulls(value, default),
                        None => value.clone(),
                    };
                    (key.clone(), healed)
                })
                .collect(),
        ),
        (other, _) => other.clone(),
    }
}

fn section<T: DeserializeOwned>(tree: &Value, name: &str, fallback: T) -> T {
    let Some(value) = tree.get(name) else {
        return fallback;
    };
    match serde_json::from_value(value.clone()) {
        Ok(typed) => typed,
        Err(e) => {
            tracing::warn!(section = name, error = %e, "Config section invalid, using built-in defaults");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectionLogic;
    use proptest::prelude::*;
    use serde_json::json;

    fn overlay(value: Value) -> Option<Map<String, Value>> {
        match value {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    // ============================================
    // Merge round-trips
    // ============================================

    #[test]
    fn empty_override_reproduces_defaults() {
        let store = ConfigStore::with_override(Some(Map::new()));
        assert_eq!(store.merged(), store.defaults());
        assert!(store.missing_sections().is_empty());
    }

    #[test]
    fn full_override_reproduces_override_tree() {
        let mut full = AppConfig::default();
        full.system_settings.log_level = "DEBUG".to_string();
        full.data_processor_settings.weights.volatility_based.iv_percentile_threshold = 40.0;
        let tree = full.to_tree();
        let store = ConfigStore::with_override(overlay(tree.clone()));
        assert_eq!(store.merged(), &tree);
        assert_eq!(store.config().system_settings.log_level, "DEBUG");
    }

    // ============================================
    // Lookup fallbacks
    // ============================================

    #[test]
    fn get_prefers_override_value() {
        let store = ConfigStore::with_override(overlay(json!({
            "strategy_settings": {"recommendations": {"min_reissue_time_seconds": 60}}
        })));
        let secs: i64 = store.get(
            &["strategy_settings", "recommendations", "min_reissue_time_seconds"],
            0,
        );
        assert_eq!(secs, 60);
    }

    #[test]
    fn null_override_falls_through_to_defaults() {
        let store = ConfigStore::with_override(overlay(json!({
            "data_processor_settings": {"approximations": {"tdpi_atr_fallback": {"min_value": null}}}
        })));
        let min: f64 = store.get(
            &["data_processor_settings", "approximations", "tdpi_atr_fallback", "min_value"],
            99.0,
        );
        assert_eq!(min, 1.0);
        assert_eq!(
            store.config().data_processor_settings.approximations.tdpi_atr_fallback.min_value,
            1.0
        );
    }

    #[test]
    fn unknown_path_uses_caller_default() {
        let store = ConfigStore::from_defaults();
        assert_eq!(store.get(&["no", "such", "path"], 7_u32), 7);
        assert!(store.get_value(&["no", "such"]).is_none());
    }

    #[test]
    fn wrong_type_counts_as_absent() {
        let store = ConfigStore::with_override(overlay(json!({
            "system_settings": {"df_history_maxlen": "lots"}
        })));
        let len: i64 = store.get(&["system_settings", "df_history_maxlen"], 0);
        assert_eq!(len, 5);
    }

    // ============================================
    // Validation and typed view
    // ============================================

    #[test]
    fn nulled_required_section_is_reported() {
        let store = ConfigStore::with_override(overlay(json!({"strategy_settings": null})));
        assert_eq!(store.missing_sections(), ["strategy_settings".to_string()]);
        assert_eq!(
            store.config().strategy_settings.recommendations.min_reissue_time_seconds,
            300
        );
    }

    #[test]
    fn invalid_section_falls_back_alone() {
        let store = ConfigStore::with_override(overlay(json!({
            "system_settings": {"log_level": "WARN"},
            "data_processor_settings": {"weights": {"time_based": {"morning": "oops"}}}
        })));
        assert_eq!(store.config().system_settings.log_level, "WARN");
        assert_eq!(
            store.config().data_processor_settings.weights.time_based.morning["dag_custom"],
            0.3
        );
    }

    #[test]
    fn selection_logic_override_reaches_typed_view() {
        let store = ConfigStore::with_override(overlay(json!({
            "data_processor_settings": {"weights": {"selection_logic": "volatility_based"}}
        })));
        assert_eq!(
            store.config().data_processor_settings.weights.selection_logic,
            SelectionLogic::VolatilityBased
        );
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(|n| json!(n)),
            "[a-z]{0,6}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z_]{1,8}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn get_never_panics(
            tree in arb_json(),
            path in prop::collection::vec("[a-z_]{1,24}", 0..6),
        ) {
            let store = ConfigStore::with_override(overlay(tree));
            let keys: Vec<&str> = path.iter().map(String::as_str).collect();
            let _ = store.get::<f64>(&keys, 0.0);
            let _ = store.get::<Vec<String>>(&keys, Vec::new());
            let _ = store.get_value(&keys);
        }
    }
}
