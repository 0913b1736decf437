//! Configuration file loading
//!
//! A config file supplies defaults for driver create flags:
//!
//! ```yaml
//! version: "1.0"
//! flags:
//!   kubevirt-memory: 2048
//!   kubevirt-namespace: machines
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Full configuration file structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Version of config file format
    #[serde(default = "default_version")]
    pub version: String,

    /// Create flag defaults keyed by flag name
    #[serde(default)]
    pub flags: BTreeMap<String, serde_json::Value>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl ConfigFile {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        Ok(config)
    }

    /// Flag values in their raw string form
    pub fn flag_values(&self) -> Vec<(String, String)> {
        self.flags
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(name, value)| {
                let raw = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (name.clone(), raw)
            })
            .collect()
    }
}

fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
