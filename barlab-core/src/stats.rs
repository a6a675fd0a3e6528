//! End-of-run statistics — pure functions over the equity curve and the
//! trade ledger.
//!
//! Every metric is a pure function: curve and/or ledger in, scalar out.
//! `Stats::compute` aggregates them into the run report.

use crate::domain::Trade;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 3600.0;

/// Aggregate statistics for a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    pub starting_cash: f64,
    pub final_equity: f64,
    /// (final − starting) / starting, as a percentage.
    pub total_return_pct: f64,
    pub n_trades: usize,
    pub win_rate: f64,
    pub avg_trade_pl: f64,
    pub profit_factor: f64,
    /// Peak-to-trough decline as a negative percentage (−15.0 = 15% drawdown).
    pub max_drawdown_pct: f64,
    /// Annualised from per-bar returns, scaled by √(bars per year).
    pub sharpe: f64,
    /// Inferred from the median timestamp gap.
    pub bars_per_year: f64,
}

impl Stats {
    /// Compute all metrics. `timestamps` is the full bar index, used only
    /// to infer the annualisation factor.
    pub fn compute(
        equity_curve: &[f64],
        trades: &[Trade],
        timestamps: &[DateTime<Utc>],
        starting_cash: f64,
    ) -> Self {
        let final_equity = equity_curve.last().copied().unwrap_or(starting_cash);
        let bpy = bars_per_year(timestamps);
        Self {
            starting_cash,
            final_equity,
            total_return_pct: total_return(equity_curve, starting_cash) * 100.0,
            n_trades: trades.len(),
            win_rate: win_rate(trades),
            avg_trade_pl: avg_trade_pl(trades),
            profit_factor: profit_factor(trades),
            max_drawdown_pct: max_drawdown(equity_curve) * 100.0,
            sharpe: sharpe_ratio(equity_curve, bpy),
            bars_per_year: bpy,
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction of starting cash.
pub fn total_return(equity_curve: &[f64], starting_cash: f64) -> f64 {
    if starting_cash <= 0.0 {
        return 0.0;
    }
    match equity_curve.last() {
        Some(&final_eq) => (final_eq - starting_cash) / starting_cash,
        None => 0.0,
    }
}

/// Fraction of closed trades with positive net P&L.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Mean net P&L per closed trade.
pub fn avg_trade_pl(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.pl).sum::<f64>() / trades.len() as f64
}

/// Gross profits over gross losses. Capped at 100.0 when losses vanish.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades.iter().filter(|t| t.pl > 0.0).map(|t| t.pl).sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.pl < 0.0)
        .map(|t| t.pl.abs())
        .sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let mut peak = equity_curve[0];
    let mut max_dd = 0.0_f64;

    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = (eq - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Annualised Sharpe ratio from per-bar equity returns.
///
/// Sharpe = mean(returns) / std(returns) × √(bars per year).
/// Returns 0.0 when variance is zero or fewer than 3 equity points exist.
pub fn sharpe_ratio(equity_curve: &[f64], bars_per_year: f64) -> f64 {
    let returns = per_bar_returns(equity_curve);
    if returns.len() < 2 || bars_per_year <= 0.0 {
        return 0.0;
    }
    let mean = mean_f64(&returns);
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    (mean / std) * bars_per_year.sqrt()
}

/// Bars per year inferred from the median gap between timestamps.
///
/// 15-minute bars give ~35,000, daily bars ~365. Zero when the index is
/// too short or degenerate (all-duplicate timestamps).
pub fn bars_per_year(timestamps: &[DateTime<Utc>]) -> f64 {
    if timestamps.len() < 2 {
        return 0.0;
    }
    let mut gaps: Vec<i64> = timestamps
        .windows(2)
        .map(|w| (w[1] - w[0]).num_seconds())
        .collect();
    gaps.sort_unstable();
    let median = gaps[gaps.len() / 2];
    if median <= 0 {
        return 0.0;
    }
    SECONDS_PER_YEAR / median as f64
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Per-bar fractional returns of the equity curve.
pub fn per_bar_returns(equity_curve: &[f64]) -> Vec<f64> {
    if equity_curve.len() < 2 {
        return Vec::new();
    }
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExitReason, Side};
    use chrono::TimeZone;

    fn make_trade(pl: f64) -> Trade {
        let mut trade = Trade::open(Side::Long, 10.0, 0, 100.0, 0.0);
        trade.close(5, 100.0 + pl / 10.0, 0.0, ExitReason::Strategy);
        trade
    }

    fn minute_index(n: usize, step_mins: i64) -> Vec<DateTime<Utc>> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| start + chrono::Duration::minutes(step_mins * i as i64))
            .collect()
    }

    // ── Total return ──

    #[test]
    fn total_return_positive() {
        let eq = vec![100_000.0, 100_500.0, 110_000.0];
        assert!((total_return(&eq, 100_000.0) - 0.1).abs() < 1e-10);
    }

    #[test]
    fn total_return_empty_curve() {
        assert_eq!(total_return(&[], 100_000.0), 0.0);
    }

    // ── Win rate / averages ──

    #[test]
    fn win_rate_mixed() {
        let trades = vec![
            make_trade(500.0),
            make_trade(-200.0),
            make_trade(300.0),
            make_trade(-100.0),
        ];
        assert!((win_rate(&trades) - 0.5).abs() < 1e-10);
    }

    #[test]
    fn win_rate_empty() {
        assert_eq!(win_rate(&[]), 0.0);
    }

    #[test]
    fn avg_trade_pl_mixed() {
        let trades = vec![make_trade(100.0), make_trade(-50.0)];
        assert!((avg_trade_pl(&trades) - 25.0).abs() < 1e-9);
    }

    // ── Profit factor ──

    #[test]
    fn profit_factor_mixed() {
        let trades = vec![make_trade(500.0), make_trade(-200.0), make_trade(300.0)];
        assert!((profit_factor(&trades) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn profit_factor_all_winners_capped() {
        let trades = vec![make_trade(500.0), make_trade(300.0)];
        assert!((profit_factor(&trades) - 100.0).abs() < 1e-10);
    }

    #[test]
    fn profit_factor_all_losers() {
        let trades = vec![make_trade(-500.0)];
        assert_eq!(profit_factor(&trades), 0.0);
    }

    // ── Max drawdown ──

    #[test]
    fn max_drawdown_known() {
        let eq = vec![100_000.0, 110_000.0, 90_000.0, 95_000.0];
        let expected = (90_000.0 - 110_000.0) / 110_000.0;
        assert!((max_drawdown(&eq) - expected).abs() < 1e-10);
    }

    #[test]
    fn max_drawdown_monotonic_is_zero() {
        let eq: Vec<f64> = (0..100).map(|i| 100_000.0 + i as f64 * 100.0).collect();
        assert_eq!(max_drawdown(&eq), 0.0);
    }

    // ── Sharpe / annualisation ──

    #[test]
    fn bars_per_year_fifteen_minute() {
        let index = minute_index(100, 15);
        let bpy = bars_per_year(&index);
        let expected = 365.25 * 24.0 * 4.0;
        assert!((bpy - expected).abs() < 1.0, "got {bpy}");
    }

    #[test]
    fn bars_per_year_ignores_occasional_gaps() {
        // Mostly 15-minute spacing with one weekend hole: median unaffected.
        let mut index = minute_index(50, 15);
        let last = *index.last().unwrap();
        index.push(last + chrono::Duration::days(2));
        for i in 1..30 {
            index.push(last + chrono::Duration::days(2) + chrono::Duration::minutes(15 * i));
        }
        let bpy = bars_per_year(&index);
        assert!((bpy - 365.25 * 24.0 * 4.0).abs() < 1.0);
    }

    #[test]
    fn bars_per_year_degenerate() {
        assert_eq!(bars_per_year(&[]), 0.0);
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(bars_per_year(&[t, t, t]), 0.0);
    }

    #[test]
    fn sharpe_constant_equity_is_zero() {
        let eq = vec![100_000.0; 100];
        assert_eq!(sharpe_ratio(&eq, 252.0), 0.0);
    }

    #[test]
    fn sharpe_positive_for_steady_gains() {
        let mut eq = vec![100_000.0];
        for i in 1..200 {
            let r = if i % 2 == 0 { 1.002 } else { 1.0005 };
            eq.push(eq[i - 1] * r);
        }
        let s = sharpe_ratio(&eq, 252.0);
        assert!(s > 5.0, "expected high Sharpe, got {s}");
    }

    // ── Aggregate ──

    #[test]
    fn compute_zero_trades_zero_return() {
        let index = minute_index(10, 15);
        let eq = vec![100_000.0; 10];
        let stats = Stats::compute(&eq, &[], &index, 100_000.0);
        assert_eq!(stats.n_trades, 0);
        assert_eq!(stats.total_return_pct, 0.0);
        assert_eq!(stats.win_rate, 0.0);
        assert_eq!(stats.sharpe, 0.0);
        assert!(stats.max_drawdown_pct.abs() < 1e-12);
    }

    #[test]
    fn compute_empty_curve_reports_starting_cash() {
        let stats = Stats::compute(&[], &[], &[], 50_000.0);
        assert_eq!(stats.final_equity, 50_000.0);
        assert_eq!(stats.total_return_pct, 0.0);
    }

    #[test]
    fn compute_all_fields_finite() {
        let index = minute_index(200, 15);
        let mut eq = vec![100_000.0];
        for i in 1..200 {
            let r = if i % 3 == 0 { 0.999 } else { 1.0015 };
            eq.push(eq[i - 1] * r);
        }
        let trades = vec![make_trade(500.0), make_trade(-200.0)];
        let stats = Stats::compute(&eq, &trades, &index, 100_000.0);
        assert!(stats.total_return_pct.is_finite());
        assert!(stats.sharpe.is_finite());
        assert!(stats.max_drawdown_pct.is_finite());
        assert!(stats.profit_factor.is_finite());
        assert_eq!(stats.n_trades, 2);
    }
}
