use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::temporal::{Period, TimeRange};

pub const ENV_DATABASE: &str = "NETWORTH_DB";
pub const ENV_ADDR: &str = "NETWORTH_ADDR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    pub server_addr: String,
    pub default_period: Period,
    pub default_range: TimeRange,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: PathBuf::from("networth.db"),
            server_addr: "127.0.0.1:3000".to_string(),
            default_period: Period::default(),
            default_range: TimeRange::default(),
        }
    }
}

impl Config {
    /// Read a JSON config file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Defaults (or the given file), then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    /// Apply overrides from a key lookup (the process environment in practice)
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup(ENV_DATABASE).filter(|v| !v.is_empty()) {
            self.database_path = PathBuf::from(db);
        }
        if let Some(addr) = lookup(ENV_ADDR).filter(|v| !v.is_empty()) {
            self.server_addr = addr;
        }
        self
    }
}
