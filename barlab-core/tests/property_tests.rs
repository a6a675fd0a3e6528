//! Property tests for engine invariants.
//!
//! Uses proptest to verify, across randomised data and strategy parameters:
//! 1. Conservation — final equity equals starting cash plus gross realized
//!    P&L minus all commissions.
//! 2. Trade ordering — entry bar ≤ exit bar for every closed trade.
//! 3. Determinism — identical runs produce identical curves and ledgers.
//! 4. Curve shape — one equity point per simulated bar.

use barlab_core::data::synthetic_walk;
use barlab_core::domain::OrderSpec;
use barlab_core::engine::{run_backtest, BarCtx, EngineConfig, EngineError, InitCtx, Strategy};
use proptest::prelude::*;

/// Enters every `every` bars, holds for `hold` bars, optionally with
/// percent brackets; alternates long/short when `alternate` is set.
#[derive(Debug, Clone)]
struct PeriodicTrader {
    every: usize,
    hold: usize,
    size: f64,
    alternate: bool,
    use_brackets: bool,
    entries: usize,
    entered_at: Option<usize>,
}

impl PeriodicTrader {
    fn new(every: usize, hold: usize, size: f64, alternate: bool, use_brackets: bool) -> Self {
        Self {
            every,
            hold,
            size,
            alternate,
            use_brackets,
            entries: 0,
            entered_at: None,
        }
    }
}

impl Strategy for PeriodicTrader {
    fn init(&mut self, _ctx: &mut InitCtx) -> Result<(), EngineError> {
        Ok(())
    }

    fn next(&mut self, ctx: &mut BarCtx) -> Result<(), EngineError> {
        let i = ctx.bar_index();

        if let Some(at) = self.entered_at {
            if i >= at + self.hold {
                ctx.close_position();
                self.entered_at = None;
            }
            return Ok(());
        }

        if i % self.every == 0 {
            let close = ctx.data().close()[-1];
            let short = self.alternate && self.entries % 2 == 1;
            let mut spec = OrderSpec::units(self.size);
            if self.use_brackets {
                spec = if short {
                    spec.stop_loss(close * 1.05).take_profit(close * 0.95)
                } else {
                    spec.stop_loss(close * 0.95).take_profit(close * 1.05)
                };
            }
            let submitted = if short { ctx.sell(spec) } else { ctx.buy(spec) };
            submitted?;
            self.entries += 1;
            self.entered_at = Some(i);
        }
        Ok(())
    }
}

fn run_config() -> EngineConfig {
    EngineConfig {
        starting_cash: 1_000_000.0,
        commission: 0.002,
        margin: 1.0,
        exclusive_orders: false,
    }
}

proptest! {
    /// Conservation: |final equity − (starting + Σ gross P&L − Σ commissions)| < 1e-6.
    #[test]
    fn conservation_holds(
        seed in 0u64..500,
        every in 2usize..20,
        hold in 1usize..15,
        size in 1.0f64..200.0,
        alternate in prop::bool::ANY,
        use_brackets in prop::bool::ANY,
    ) {
        let series = synthetic_walk(300, seed);
        let mut strategy = PeriodicTrader::new(every, hold, size.round(), alternate, use_brackets);
        let result = run_backtest(&series, &mut strategy, &run_config()).unwrap();

        let commissions: f64 = result
            .trades
            .iter()
            .map(|t| t.entry_commission + t.exit_commission)
            .sum();
        let gross: f64 = result.trades.iter().map(|t| t.pl).sum::<f64>() + commissions;
        let expected = 1_000_000.0 + gross - commissions;

        prop_assert!(
            (result.stats.final_equity - expected).abs() < 1e-6,
            "conservation violated: final={}, expected={}",
            result.stats.final_equity,
            expected
        );
    }

    /// Every closed trade exits at or after its entry bar, and all trades
    /// are closed by the time the run ends.
    #[test]
    fn trades_are_ordered_and_closed(
        seed in 0u64..500,
        every in 2usize..20,
        hold in 1usize..15,
        use_brackets in prop::bool::ANY,
    ) {
        let series = synthetic_walk(250, seed);
        let mut strategy = PeriodicTrader::new(every, hold, 10.0, false, use_brackets);
        let result = run_backtest(&series, &mut strategy, &run_config()).unwrap();

        for trade in &result.trades {
            let exit_bar = trade.exit_bar.expect("ledger trade must be closed");
            prop_assert!(exit_bar >= trade.entry_bar);
            prop_assert!(trade.exit_price.is_some());
            prop_assert!(trade.exit_reason.is_some());
        }
    }

    /// Same data, same parameters → identical equity curve and ledger.
    #[test]
    fn reruns_are_deterministic(
        seed in 0u64..200,
        every in 2usize..15,
        hold in 1usize..10,
    ) {
        let series = synthetic_walk(200, seed);
        let config = run_config();

        let mut s1 = PeriodicTrader::new(every, hold, 25.0, true, true);
        let mut s2 = PeriodicTrader::new(every, hold, 25.0, true, true);
        let a = run_backtest(&series, &mut s1, &config).unwrap();
        let b = run_backtest(&series, &mut s2, &config).unwrap();

        prop_assert_eq!(a.equity_curve, b.equity_curve);
        prop_assert_eq!(a.trades.len(), b.trades.len());
        for (ta, tb) in a.trades.iter().zip(&b.trades) {
            prop_assert_eq!(ta.entry_bar, tb.entry_bar);
            prop_assert_eq!(ta.exit_bar, tb.exit_bar);
            prop_assert!((ta.pl - tb.pl).abs() < 1e-12);
        }
    }

    /// One equity point per simulated bar, and equity never NaN.
    #[test]
    fn equity_curve_is_dense_and_finite(
        seed in 0u64..200,
        every in 2usize..15,
    ) {
        let series = synthetic_walk(200, seed);
        let mut strategy = PeriodicTrader::new(every, 5, 10.0, false, false);
        let result = run_backtest(&series, &mut strategy, &run_config()).unwrap();

        prop_assert_eq!(result.equity_curve.len(), 200 - result.first_active_bar);
        for &point in &result.equity_curve {
            prop_assert!(point.is_finite());
        }
    }
}
