//! Barlab CLI — run backtests and inspect bar data.
//!
//! Commands:
//! - `run` — execute a backtest from a TOML config file or a named preset
//! - `inspect` — report rows, columns, date range, and anomalies of a CSV

use anyhow::{bail, Context, Result};
use barlab_core::data::load::load_csv;
use barlab_runner::{run_from_config, save_artifacts, BacktestResult, RunConfig};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "barlab", about = "Barlab CLI — event-driven OHLCV backtesting engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file or a named preset.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Named preset: sma_cross, channel_breakout, buy_hold.
        #[arg(long)]
        preset: Option<String>,

        /// Input CSV (required with --preset).
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Timestamp column header (used with --preset).
        #[arg(long, default_value = "datetime")]
        timestamp_column: String,

        /// Starting cash (used with --preset).
        #[arg(long, default_value_t = 1_000_000.0)]
        cash: f64,

        /// Commission rate per notional (used with --preset).
        #[arg(long, default_value_t = 0.002)]
        commission: f64,

        /// Margin: max gross exposure as a multiple of equity.
        #[arg(long, default_value_t = 1.0)]
        margin: f64,

        /// Save result.json / trades.csv / equity.csv under this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Report rows, columns, date range, and anomalies of a bar CSV.
    Inspect {
        /// Input CSV.
        #[arg(long)]
        csv: PathBuf,

        /// Timestamp column header.
        #[arg(long, default_value = "datetime")]
        timestamp_column: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            preset,
            csv,
            timestamp_column,
            cash,
            commission,
            margin,
            output_dir,
        } => run_cmd(
            config,
            preset,
            csv,
            timestamp_column,
            cash,
            commission,
            margin,
            output_dir,
        ),
        Commands::Inspect {
            csv,
            timestamp_column,
        } => inspect_cmd(&csv, &timestamp_column),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_cmd(
    config_path: Option<PathBuf>,
    preset: Option<String>,
    csv: Option<PathBuf>,
    timestamp_column: String,
    cash: f64,
    commission: f64,
    margin: f64,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    if config_path.is_some() && preset.is_some() {
        bail!("--config and --preset are mutually exclusive");
    }

    let run_config = if let Some(path) = config_path {
        RunConfig::from_file(&path)?
    } else if let Some(name) = preset {
        let csv = csv.context("--csv is required with --preset")?;
        // Build a TOML string and parse it, so presets go through the same
        // config path as files.
        let toml_str = format!(
            r#"[data]
csv = "{}"
timestamp_column = "{timestamp_column}"

[engine]
starting_cash = {cash}
commission = {commission}
margin = {margin}

[strategy]
name = "{name}"
"#,
            csv.display()
        );
        RunConfig::from_toml(&toml_str)?
    } else {
        bail!("one of --config or --preset is required");
    };

    let result = run_from_config(&run_config)?;
    print_summary(&result);

    if let Some(dir) = output_dir {
        let run_dir = save_artifacts(&result, &dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }

    Ok(())
}

fn inspect_cmd(csv: &Path, timestamp_column: &str) -> Result<()> {
    let file = File::open(csv).with_context(|| format!("cannot open {}", csv.display()))?;
    let series = load_csv(BufReader::new(file), timestamp_column)?;

    let anomalous = (0..series.len())
        .filter(|&i| series.bar(i).is_anomalous())
        .count();
    let insane = (0..series.len())
        .filter(|&i| {
            let bar = series.bar(i);
            !bar.is_anomalous() && !bar.is_sane()
        })
        .count();
    let zero_volume = series.volume().iter().filter(|&&v| v == 0.0).count();

    println!("File:          {}", csv.display());
    println!("Bars:          {}", series.len());
    println!(
        "Range:         {} to {}",
        series.timestamps().first().unwrap(),
        series.timestamps().last().unwrap()
    );
    let extras: Vec<&str> = series.extra_columns().collect();
    println!(
        "Extra columns: {}",
        if extras.is_empty() {
            "(none)".to_string()
        } else {
            extras.join(", ")
        }
    );
    println!("Non-finite:    {anomalous}");
    println!("OHLC invalid:  {insane}");
    println!("Zero volume:   {zero_volume}");

    Ok(())
}

fn print_summary(result: &BacktestResult) {
    println!();
    println!("=== Backtest Result ===");
    println!("Strategy:       {}", result.strategy);
    println!(
        "Bars:           {} ({} warm-up, {} anomalous)",
        result.bar_count, result.first_active_bar, result.anomalous_bars
    );
    println!("Trades:         {}", result.stats.n_trades);
    println!("Rejected:       {}", result.rejected_orders.len());
    println!();
    println!("--- Performance ---");
    println!("Total Return:   {:.2}%", result.stats.total_return_pct);
    println!("Sharpe:         {:.3}", result.stats.sharpe);
    println!("Max Drawdown:   {:.2}%", result.stats.max_drawdown_pct);
    println!("Win Rate:       {:.1}%", result.stats.win_rate * 100.0);
    println!("Profit Factor:  {:.2}", result.stats.profit_factor);
    println!("Avg Trade P&L:  {:.2}", result.stats.avg_trade_pl);
    println!("Final Equity:   {:.2}", result.stats.final_equity);
    if result.aborted {
        println!();
        println!(
            "WARNING: run aborted early: {}",
            result.abort_reason.as_deref().unwrap_or("unknown")
        );
    }
    println!();
}
