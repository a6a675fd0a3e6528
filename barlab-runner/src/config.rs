//! Serializable run configuration.

use barlab_core::engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Complete configuration for a single backtest run.
///
/// Strategy parameters use a `BTreeMap` so serialization is deterministic
/// and two identical configs always hash identically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    pub data: DataSection,
    #[serde(default)]
    pub engine: EngineSection,
    pub strategy: StrategySection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataSection {
    /// Input CSV with a header row.
    pub csv: PathBuf,
    /// Header of the timestamp column (case-insensitive).
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,
}

fn default_timestamp_column() -> String {
    "datetime".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSection {
    pub starting_cash: f64,
    pub commission: f64,
    pub margin: f64,
    pub exclusive_orders: bool,
}

impl Default for EngineSection {
    fn default() -> Self {
        let defaults = EngineConfig::default();
        Self {
            starting_cash: defaults.starting_cash,
            commission: defaults.commission,
            margin: defaults.margin,
            exclusive_orders: defaults.exclusive_orders,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategySection {
    /// Preset name: `sma_cross`, `channel_breakout`, or `buy_hold`.
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

impl RunConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            starting_cash: self.engine.starting_cash,
            commission: self.engine.commission,
            margin: self.engine.margin,
            exclusive_orders: self.engine.exclusive_orders,
        }
    }

    /// Deterministic identity of this configuration.
    ///
    /// Canonical serialization: BTreeMap keys are sorted, so identical
    /// configs hash identically and can share cached results.
    pub fn config_hash(&self) -> String {
        let json = serde_json::to_string(self).expect("RunConfig must serialize");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[data]
csv = "bars.csv"

[strategy]
name = "sma_cross"

[strategy.params]
fast = 10
slow = 30
"#;

    #[test]
    fn parses_with_engine_defaults() {
        let config = RunConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.data.timestamp_column, "datetime");
        assert_eq!(config.engine.starting_cash, 1_000_000.0);
        assert_eq!(config.engine.commission, 0.002);
        assert_eq!(config.engine.margin, 1.0);
        assert!(!config.engine.exclusive_orders);
        assert_eq!(config.strategy.params["fast"], 10.0);
    }

    #[test]
    fn engine_overrides_respected() {
        let toml = r#"
[data]
csv = "bars.csv"
timestamp_column = "Date"

[engine]
starting_cash = 50000.0
commission = 0.001
margin = 2.0
exclusive_orders = true

[strategy]
name = "buy_hold"
"#;
        let config = RunConfig::from_toml(toml).unwrap();
        assert_eq!(config.data.timestamp_column, "Date");
        let engine = config.engine_config();
        assert_eq!(engine.starting_cash, 50_000.0);
        assert_eq!(engine.margin, 2.0);
        assert!(engine.exclusive_orders);
    }

    #[test]
    fn identical_configs_hash_identically() {
        let a = RunConfig::from_toml(MINIMAL).unwrap();
        let b = RunConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(a.config_hash(), b.config_hash());
    }

    #[test]
    fn param_change_changes_hash() {
        let a = RunConfig::from_toml(MINIMAL).unwrap();
        let mut b = a.clone();
        b.strategy.params.insert("fast".into(), 12.0);
        assert_ne!(a.config_hash(), b.config_hash());
    }
}
