//! Modular configuration loader.
//!
//! Supports loading configuration from multiple files:
//! - `config.json` - Core configuration
//! - `secrets.json` - Credentials (inference token)
//!
//! Files are loaded from `~/.civic/` with proper merging.

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::config_dir;

/// Load a JSON file and return its contents as a Value.
/// Returns None if file doesn't exist.
fn load_json_file(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    Ok(Some(value))
}

/// Deep merge two JSON values.
/// Source values override target values, with object merging at each level.
fn merge_json(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, source_value) in source_map {
                match target_map.get_mut(&key) {
                    Some(target_value) => merge_json(target_value, source_value),
                    None => {
                        target_map.insert(key, source_value);
                    }
                }
            }
        }
        (target, source) => {
            *target = source;
        }
    }
}

/// Load modular configuration from the config directory.
///
/// Priority (lowest to highest):
/// 1. config.json
/// 2. secrets.json (merged under `secrets`)
/// 3. Environment variables (applied separately)
pub fn load_modular_config(dir: Option<PathBuf>) -> Result<Value> {
    let cfg_dir = dir.unwrap_or_else(config_dir);

    let mut config = load_json_file(&cfg_dir.join("config.json"))?
        .unwrap_or(Value::Object(Default::default()));

    tracing::debug!("Loading modular config from {}", cfg_dir.display());

    if let Some(secrets) = load_json_file(&cfg_dir.join("secrets.json"))? {
        // Meta-fields like `$schema` are not credentials
        let secrets = match secrets {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .filter(|(key, _)| !key.starts_with('$') && !key.starts_with('_'))
                    .collect(),
            ),
            other => other,
        };

        if let Some(config_obj) = config.as_object_mut() {
            match config_obj.get_mut("secrets") {
                Some(existing) => merge_json(existing, secrets),
                None => {
                    config_obj.insert("secrets".to_string(), secrets);
                }
            }
        }
        tracing::debug!("Loaded secrets.json");
    }

    Ok(config)
}
