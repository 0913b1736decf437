//! Environment variable configuration

use std::env;
use std::path::PathBuf;

/// Environment variable prefix
const ENV_PREFIX: &str = "KUBEVIRT_MACHINE";

/// Settings read from `KUBEVIRT_MACHINE_*` variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Machine store root from KUBEVIRT_MACHINE_STORAGE_PATH
    pub storage_path: Option<PathBuf>,
    /// Log level from KUBEVIRT_MACHINE_LOG_LEVEL
    pub log_level: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            storage_path: get_env("STORAGE_PATH").map(PathBuf::from),
            log_level: get_env("LOG_LEVEL"),
        }
    }
}

/// Value of `var`, treating empty as unset
pub fn lookup(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.is_empty())
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    lookup(&format!("{ENV_PREFIX}_{name}"))
}
