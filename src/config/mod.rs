//! Configuration module
//!
//! Driver flag declarations, the option values handed to a driver, and the
//! on-disk machine store.

pub mod env;
mod file;
mod store;

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::fmt;

pub use file::ConfigFile;
pub use store::{MachineRecord, MachineStore};

/// Value of a driver flag
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlagValue {
    Int(i64),
    String(String),
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::Int(v) => write!(f, "{v}"),
            FlagValue::String(v) => write!(f, "{v}"),
        }
    }
}

/// A create flag exposed by a driver
#[derive(Clone, Debug)]
pub struct Flag {
    pub name: String,
    pub usage: String,
    /// Default value, also fixes the flag's type
    pub value: FlagValue,
    /// Environment variable that overrides the default
    pub env_var: Option<String>,
}

impl Flag {
    /// Integer flag
    pub fn int(name: impl Into<String>, usage: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            usage: usage.into(),
            value: FlagValue::Int(value),
            env_var: None,
        }
    }

    /// String flag
    pub fn string(name: impl Into<String>, usage: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            usage: usage.into(),
            value: FlagValue::String(value.into()),
            env_var: None,
        }
    }

    /// Read the default from an environment variable when set
    pub fn env(mut self, var: impl Into<String>) -> Self {
        self.env_var = Some(var.into());
        self
    }

    /// Parse a raw string into this flag's type
    pub fn parse(&self, raw: &str) -> Result<FlagValue> {
        match self.value {
            FlagValue::Int(_) => raw
                .trim()
                .parse()
                .map(FlagValue::Int)
                .with_context(|| format!("flag {} expects an integer, got {raw:?}", self.name)),
            FlagValue::String(_) => Ok(FlagValue::String(raw.to_string())),
        }
    }
}

/// Option lookup used by drivers to read their configuration
pub trait DriverOptions: Send + Sync {
    /// Integer value of `key`, zero when absent
    fn int(&self, key: &str) -> i64;

    /// String value of `key`, empty when absent
    fn string(&self, key: &str) -> String;
}

/// Resolved flag values.
///
/// Built from flag defaults, then layered with a config file, flag
/// environment variables and explicit command line values.
#[derive(Clone, Debug, Default)]
pub struct FlagValues {
    flags: Vec<Flag>,
    values: BTreeMap<String, FlagValue>,
}

impl FlagValues {
    /// Start from the flags' defaults
    pub fn from_flags(flags: Vec<Flag>) -> Self {
        let values = flags
            .iter()
            .map(|flag| (flag.name.clone(), flag.value.clone()))
            .collect();
        Self { flags, values }
    }

    /// Resolve flags from every source.
    ///
    /// Later layers win: defaults, then `file`, then flag environment
    /// variables, then `overrides` from the command line.
    pub fn resolve(
        flags: Vec<Flag>,
        file: Option<&ConfigFile>,
        overrides: &[(String, String)],
    ) -> Result<Self> {
        let mut values = Self::from_flags(flags);
        if let Some(file) = file {
            values.apply_file(file).context("Invalid config file")?;
        }
        values.apply_env()?;
        for (name, raw) in overrides {
            values.set(name, raw)?;
        }
        Ok(values)
    }

    fn flag(&self, name: &str) -> Result<&Flag> {
        match self.flags.iter().find(|f| f.name == name) {
            Some(flag) => Ok(flag),
            None => bail!("unknown flag: {name}"),
        }
    }

    /// Set a flag from its raw string form
    pub fn set(&mut self, name: &str, raw: &str) -> Result<()> {
        let value = self.flag(name)?.parse(raw)?;
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Apply values found in flag environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        let overrides: Vec<(String, String, String)> = self
            .flags
            .iter()
            .filter_map(|flag| {
                let var = flag.env_var.clone()?;
                env::lookup(&var).map(|raw| (flag.name.clone(), var, raw))
            })
            .collect();

        for (name, var, raw) in overrides {
            self.set(&name, &raw)
                .with_context(|| format!("Invalid value in ${var}"))?;
        }
        Ok(())
    }

    /// Apply defaults from a config file
    pub fn apply_file(&mut self, file: &ConfigFile) -> Result<()> {
        for (name, raw) in file.flag_values() {
            self.set(&name, &raw)?;
        }
        Ok(())
    }

    /// Current value of a flag
    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&FlagValue> {
        self.values.get(name)
    }
}

impl DriverOptions for FlagValues {
    fn int(&self, key: &str) -> i64 {
        match self.values.get(key) {
            Some(FlagValue::Int(v)) => *v,
            _ => 0,
        }
    }

    fn string(&self, key: &str) -> String {
        match self.values.get(key) {
            Some(FlagValue::String(v)) => v.clone(),
            _ => String::new(),
        }
    }
}
