//! Machine store
//!
//! Each machine lives in `<root>/machines/<name>/` next to its SSH key, with
//! the configured driver serialised to `config.json`.

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::env::EnvConfig;

const MACHINES_DIR: &str = "machines";
const CONFIG_FILE: &str = "config.json";

/// Persisted machine
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineRecord<D> {
    pub name: String,
    pub driver_name: String,
    pub driver: D,
}

/// On-disk machine store
#[derive(Clone, Debug)]
pub struct MachineStore {
    root: PathBuf,
}

impl MachineStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store at the path from the environment, or `~/.kubevirt-machine`
    pub fn default_root() -> PathBuf {
        EnvConfig::load().storage_path.unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_default()
                .join(".kubevirt-machine")
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a machine's files
    pub fn machine_dir(&self, name: &str) -> PathBuf {
        self.root.join(MACHINES_DIR).join(name)
    }

    fn config_path(&self, name: &str) -> PathBuf {
        self.machine_dir(name).join(CONFIG_FILE)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.config_path(name).exists()
    }

    /// Write a machine record
    pub fn save<D: Serialize>(&self, record: &MachineRecord<D>) -> Result<()> {
        let dir = self.machine_dir(&record.name);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

        let content =
            serde_json::to_string_pretty(record).context("Failed to serialize machine")?;
        let path = self.config_path(&record.name);
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write machine config: {}", path.display()))?;
        Ok(())
    }

    /// Read a machine record
    pub fn load<D: DeserializeOwned>(&self, name: &str) -> Result<MachineRecord<D>> {
        let path = self.config_path(name);
        if !path.exists() {
            bail!("Host does not exist: {name:?}");
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read machine config: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse machine config: {}", path.display()))
    }

    /// Names of all stored machines, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        let dir = self.root.join(MACHINES_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir)
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        {
            let entry = entry?;
            if entry.path().join(CONFIG_FILE).exists() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete a machine's directory
    pub fn remove(&self, name: &str) -> Result<()> {
        let dir = self.machine_dir(name);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)
                .with_context(|| format!("Failed to remove directory: {}", dir.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> MachineRecord<serde_json::Value> {
        MachineRecord {
            name: name.to_string(),
            driver_name: "kubevirt".to_string(),
            driver: serde_json::json!({ "memory": 1024 }),
        }
    }

    #[test]
    fn test_save_load_list_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = MachineStore::new(dir.path());

        assert!(store.list().unwrap().is_empty());

        store.save(&record("beta")).unwrap();
        store.save(&record("alpha")).unwrap();
        assert!(store.exists("alpha"));
        assert_eq!(store.list().unwrap(), vec!["alpha", "beta"]);

        let loaded: MachineRecord<serde_json::Value> = store.load("alpha").unwrap();
        assert_eq!(loaded.driver_name, "kubevirt");
        assert_eq!(loaded.driver["memory"], 1024);

        store.remove("alpha").unwrap();
        assert!(!store.exists("alpha"));
        assert_eq!(store.list().unwrap(), vec!["beta"]);
    }

    #[test]
    fn test_load_missing_machine() {
        let dir = tempfile::tempdir().unwrap();
        let store = MachineStore::new(dir.path());

        let err = store.load::<serde_json::Value>("ghost").unwrap_err();
        assert!(err.to_string().contains("Host does not exist"));
    }

    #[test]
    fn test_machine_dir_layout() {
        let store = MachineStore::new("/store");
        assert_eq!(store.machine_dir("m1"), PathBuf::from("/store/machines/m1"));
    }
}
