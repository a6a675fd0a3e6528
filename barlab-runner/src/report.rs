//! Artifact export: result.json, trades.csv, equity.csv.
//!
//! The engine itself performs no file I/O; everything here is opt-in and
//! driven by the CLI's `--output-dir`.

use crate::runner::BacktestResult;
use anyhow::{Context, Result};
use barlab_core::domain::{ExitReason, Side, Trade};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write the full artifact set into `<output_dir>/<strategy>_<hash8>/` and
/// return the run directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let short_hash = &result.config_hash[..8.min(result.config_hash.len())];
    let run_dir = output_dir.join(format!("{}_{}", result.strategy, short_hash));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create run dir {}", run_dir.display()))?;

    write_result_json(&run_dir.join("result.json"), result)?;
    write_trades_csv(&run_dir.join("trades.csv"), &result.trades)?;
    write_equity_csv(&run_dir.join("equity.csv"), &result.equity_curve)?;

    Ok(run_dir)
}

pub fn write_result_json(path: &Path, result: &BacktestResult) -> Result<()> {
    let json = serde_json::to_string_pretty(result).context("failed to serialize result")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write result JSON {}", path.display()))?;
    Ok(())
}

pub fn write_trades_csv(path: &Path, trades: &[Trade]) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("failed to create trades CSV {}", path.display()))?;

    writeln!(
        file,
        "side,size,entry_bar,entry_price,exit_bar,exit_price,pl,commission,exit_reason,tag"
    )?;

    for trade in trades {
        let side = match trade.side {
            Side::Long => "Long",
            Side::Short => "Short",
        };
        let reason = match trade.exit_reason {
            Some(ExitReason::StopLoss) => "stop_loss",
            Some(ExitReason::TakeProfit) => "take_profit",
            Some(ExitReason::Strategy) => "strategy",
            Some(ExitReason::EndOfRun) => "end_of_run",
            None => "open",
        };
        writeln!(
            file,
            "{},{},{},{:.6},{},{},{:.6},{:.6},{},{}",
            side,
            trade.size,
            trade.entry_bar,
            trade.entry_price,
            trade
                .exit_bar
                .map(|b| b.to_string())
                .unwrap_or_default(),
            trade
                .exit_price
                .map(|p| format!("{p:.6}"))
                .unwrap_or_default(),
            trade.pl,
            trade.entry_commission + trade.exit_commission,
            reason,
            trade.tag.as_deref().unwrap_or(""),
        )?;
    }

    Ok(())
}

pub fn write_equity_csv(path: &Path, equity_curve: &[f64]) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("failed to create equity CSV {}", path.display()))?;

    writeln!(file, "bar,equity")?;
    for (bar, equity) in equity_curve.iter().enumerate() {
        writeln!(file, "{bar},{equity:.6}")?;
    }

    Ok(())
}
