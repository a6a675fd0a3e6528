//! Backtest runner — wires together config, data loading, the strategy
//! shim, and the engine.

use crate::config::{ConfigError, RunConfig};
use crate::strategies::{build_strategy, StrategyError};
use barlab_core::data::load::load_csv;
use barlab_core::data::{BarSeries, DataError};
use barlab_core::domain::{RejectedOrder, Trade};
use barlab_core::engine::{run_backtest, EngineError};
use barlab_core::fingerprint::dataset_fingerprint;
use barlab_core::stats::Stats;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use thiserror::Error;
use tracing::info;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot open data file: {0}")]
    Io(#[from] std::io::Error),

    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete, serializable result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub strategy: String,
    pub params: BTreeMap<String, f64>,
    pub stats: Stats,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<f64>,
    pub rejected_orders: Vec<RejectedOrder>,
    pub first_active_bar: usize,
    pub anomalous_bars: usize,
    pub bar_count: usize,
    pub aborted: bool,
    pub abort_reason: Option<String>,
    /// Blake3 of the cleaned input data.
    pub dataset_hash: String,
    /// Blake3 of the run configuration.
    pub config_hash: String,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Load the configured CSV and run. The high-level entry point the CLI uses.
pub fn run_from_config(config: &RunConfig) -> Result<BacktestResult, RunError> {
    let file = File::open(&config.data.csv)?;
    let series = load_csv(BufReader::new(file), &config.data.timestamp_column)?;
    info!(
        bars = series.len(),
        csv = %config.data.csv.display(),
        "loaded bar series"
    );
    run_on_series(config, &series)
}

/// Run against a pre-loaded series — no I/O.
pub fn run_on_series(config: &RunConfig, series: &BarSeries) -> Result<BacktestResult, RunError> {
    let mut strategy = build_strategy(&config.strategy.name, &config.strategy.params)?;
    let result = run_backtest(series, strategy.as_mut(), &config.engine_config())?;

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        strategy: config.strategy.name.clone(),
        params: config.strategy.params.clone(),
        stats: result.stats,
        trades: result.trades,
        equity_curve: result.equity_curve,
        rejected_orders: result.rejected_orders,
        first_active_bar: result.first_active_bar,
        anomalous_bars: result.anomalous_bars,
        bar_count: series.len(),
        aborted: result.aborted,
        abort_reason: result.abort_reason,
        dataset_hash: dataset_fingerprint(series),
        config_hash: config.config_hash(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use barlab_core::data::synthetic_walk;

    fn toml_config(strategy: &str) -> RunConfig {
        RunConfig::from_toml(&format!(
            r#"
[data]
csv = "unused.csv"

[engine]
starting_cash = 100000.0
commission = 0.001

[strategy]
name = "{strategy}"
"#
        ))
        .unwrap()
    }

    #[test]
    fn run_on_series_fills_result_metadata() {
        let series = synthetic_walk(300, 41);
        let config = toml_config("buy_hold");
        let result = run_on_series(&config, &series).unwrap();

        assert_eq!(result.schema_version, SCHEMA_VERSION);
        assert_eq!(result.strategy, "buy_hold");
        assert_eq!(result.bar_count, 300);
        assert_eq!(result.dataset_hash, dataset_fingerprint(&series));
        assert_eq!(result.config_hash, config.config_hash());
        assert!(!result.aborted);
    }

    #[test]
    fn unknown_strategy_is_a_run_error() {
        let series = synthetic_walk(50, 42);
        let config = toml_config("does_not_exist");
        assert!(matches!(
            run_on_series(&config, &series),
            Err(RunError::Strategy(_))
        ));
    }

    #[test]
    fn missing_csv_is_an_io_error() {
        let config = toml_config("buy_hold");
        assert!(matches!(run_from_config(&config), Err(RunError::Io(_))));
    }

    #[test]
    fn result_json_roundtrip_with_schema_default() {
        let series = synthetic_walk(100, 43);
        let config = toml_config("buy_hold");
        let result = run_on_series(&config, &series).unwrap();

        let mut json: serde_json::Value = serde_json::to_value(&result).unwrap();
        json.as_object_mut().unwrap().remove("schema_version");
        let deser: BacktestResult = serde_json::from_value(json).unwrap();
        assert_eq!(deser.schema_version, SCHEMA_VERSION);
        assert_eq!(deser.bar_count, 100);
    }
}
