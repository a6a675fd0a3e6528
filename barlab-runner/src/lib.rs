//! Barlab Runner — configuration, strategy presets, orchestration, and
//! artifact export around `barlab-core`.

pub mod config;
pub mod report;
pub mod runner;
pub mod strategies;

pub use config::{ConfigError, RunConfig};
pub use report::save_artifacts;
pub use runner::{run_from_config, run_on_series, BacktestResult, RunError, SCHEMA_VERSION};
pub use strategies::{build_strategy, StrategyError};
