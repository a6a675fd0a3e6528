//! Runner integration tests: CSV on disk → config → run → artifacts.

use barlab_runner::{run_from_config, save_artifacts, BacktestResult, RunConfig};
use std::io::Write;
use tempfile::TempDir;

/// Write a small ramp CSV and a matching config into a temp dir.
fn fixture(strategy: &str, extra_params: &str) -> (TempDir, RunConfig) {
    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("bars.csv");
    let mut file = std::fs::File::create(&csv_path).unwrap();
    writeln!(file, "datetime,open,high,low,close,volume").unwrap();
    for i in 0..120i64 {
        // Epoch seconds, 15-minute spacing from 2024-01-01 00:00 UTC.
        let ts = 1_704_067_200 + 900 * i;
        let price = 100.0 + (i as f64) * 0.25;
        writeln!(
            file,
            "{ts},{price},{},{},{price},1000",
            price + 0.5,
            price - 0.5,
        )
        .unwrap();
    }

    let config = RunConfig::from_toml(&format!(
        r#"
[data]
csv = "{}"

[engine]
starting_cash = 100000.0
commission = 0.002

[strategy]
name = "{strategy}"
{extra_params}
"#,
        csv_path.display()
    ))
    .unwrap();

    (dir, config)
}

#[test]
fn end_to_end_buy_hold() {
    let (_dir, config) = fixture("buy_hold", "");
    let result = run_from_config(&config).unwrap();

    assert!(!result.aborted);
    assert_eq!(result.bar_count, 120);
    assert_eq!(result.trades.len(), 1);
    // The ramp rises ~30% over the run; buy-and-hold must end positive.
    assert!(result.stats.total_return_pct > 0.0);
}

#[test]
fn end_to_end_sma_cross_with_params() {
    let (_dir, config) = fixture(
        "sma_cross",
        "[strategy.params]\nfast = 5\nslow = 15\nsize_pct = 0.5",
    );
    let result = run_from_config(&config).unwrap();

    assert!(!result.aborted);
    // Warm-up equals the slow period's leading NaNs.
    assert_eq!(result.first_active_bar, 14);
    assert_eq!(result.equity_curve.len(), 120 - 14);
}

#[test]
fn artifacts_written_and_readable() {
    let (dir, config) = fixture("buy_hold", "");
    let result = run_from_config(&config).unwrap();

    let out = dir.path().join("results");
    let run_dir = save_artifacts(&result, &out).unwrap();

    let json = std::fs::read_to_string(run_dir.join("result.json")).unwrap();
    let deser: BacktestResult = serde_json::from_str(&json).unwrap();
    assert_eq!(deser.strategy, "buy_hold");
    assert_eq!(deser.dataset_hash, result.dataset_hash);

    let trades = std::fs::read_to_string(run_dir.join("trades.csv")).unwrap();
    assert!(trades.starts_with("side,size,entry_bar"));
    // Header plus one trade row.
    assert_eq!(trades.lines().count(), 2);

    let equity = std::fs::read_to_string(run_dir.join("equity.csv")).unwrap();
    assert_eq!(equity.lines().count(), result.equity_curve.len() + 1);
}

#[test]
fn identical_runs_identical_results() {
    let (_dir, config) = fixture("sma_cross", "[strategy.params]\nfast = 5\nslow = 15");
    let a = run_from_config(&config).unwrap();
    let b = run_from_config(&config).unwrap();

    assert_eq!(a.equity_curve, b.equity_curve);
    assert_eq!(a.trades.len(), b.trades.len());
    assert_eq!(a.dataset_hash, b.dataset_hash);
    assert_eq!(a.config_hash, b.config_hash);
}
