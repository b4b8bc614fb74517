use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Json},
    Figment,
};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config_store::ConfigStore;

/// Environment variables with this prefix override file values. Nested keys
/// are separated by `__`, e.g. `MSPI_SYSTEM_SETTINGS__LOG_LEVEL=DEBUG`.
pub const ENV_PREFIX: &str = "MSPI_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: Box<figment::Error>,
    },

    #[error("Config override must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Builds the session configuration from the built-in defaults and an
    /// optional JSON override file.
    ///
    /// Never fails: any problem with the override is logged and the built-in
    /// defaults are used on their own.
    #[must_use]
    pub fn load(path: Option<&Path>) -> ConfigStore {
        match Self::read_override(path) {
            Ok(overlay) => {
                tracing::info!(
                    path = ?path,
                    keys = overlay.len(),
                    "Loaded configuration override"
                );
                ConfigStore::with_override(Some(overlay))
            }
            Err(e) => {
                tracing::error!(error = %e, "Using built-in default configuration only");
                ConfigStore::from_defaults()
            }
        }
    }

    /// Reads the override tree: the JSON file (if a path is given) with
    /// `MSPI_`-prefixed environment variables layered on top.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, cannot be parsed, or its top
    /// level is not an object.
    pub fn read_override(path: Option<&Path>) -> Result<Map<String, Value>, ConfigError> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            if !path.is_file() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            figment = figment.merge(Json::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let tree: Value = figment.extract().map_err(|e| ConfigError::Parse {
            path: path.map_or_else(|| "<env>".to_string(), |p| p.display().to_string()),
            source: Box::new(e),
        })?;

        match tree {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(ConfigError::NotAnObject(json_kind(&other))),
        }
    }
}

/// Deep-merges `overlay` onto `base`: objects merge key by key, any other
/// overlay value (lists included) replaces the base value.
#[must_use]
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, value) in overlay_map {
                let next = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (_, other) => other.clone(),
    }
}

pub(crate) const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn merge_replaces_lists_and_recurses_objects() {
        let base = json!({"a": {"x": 1, "y": [1, 2]}, "b": 2});
        let overlay = json!({"a": {"y": [9]}, "c": 3});
        let merged = deep_merge(&base, &overlay);
        assert_eq!(merged, json!({"a": {"x": 1, "y": [9]}, "b": 2, "c": 3}));
    }

    #[test]
    fn merge_scalar_over_object_replaces() {
        let merged = deep_merge(&json!({"a": {"x": 1}}), &json!({"a": 5}));
        assert_eq!(merged, json!({"a": 5}));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = ConfigLoader::read_override(Some(Path::new("/definitely/not/here.json")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = ConfigLoader::read_override(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn reads_object_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"system_settings": {{"log_level": "DEBUG"}}}}"#).unwrap();
        let map = ConfigLoader::read_override(Some(file.path())).unwrap();
        assert_eq!(map["system_settings"]["log_level"], json!("DEBUG"));
    }
}
