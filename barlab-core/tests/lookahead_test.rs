//! Look-ahead contamination tests.
//!
//! Invariant: during `next` at bar i, `data().close()[-1]` equals the close
//! of bar i and no bar beyond i is observable — for price columns, the
//! timestamp index, and indicator views alike.

use barlab_core::data::synthetic_walk;
use barlab_core::engine::{run_backtest, BarCtx, EngineConfig, EngineError, InitCtx, Strategy};
use barlab_core::indicators::{IndicatorHandle, InputRef};

/// Records everything visible at each bar for post-run assertions.
struct Recorder {
    identity: Option<IndicatorHandle>,
    visible_lens: Vec<usize>,
    latest_closes: Vec<f64>,
    latest_indicator: Vec<f64>,
    future_leaks: usize,
}

impl Recorder {
    fn new() -> Self {
        Self {
            identity: None,
            visible_lens: Vec::new(),
            latest_closes: Vec::new(),
            latest_indicator: Vec::new(),
            future_leaks: 0,
        }
    }
}

impl Strategy for Recorder {
    fn init(&mut self, ctx: &mut InitCtx) -> Result<(), EngineError> {
        // Identity over close: the indicator view must track the data view
        // bar for bar.
        self.identity = Some(ctx.indicator(
            "close_copy",
            &[InputRef::column("close")],
            |inputs| Ok(inputs[0].series().ok_or("expected series")?.to_vec().into()),
        )?);
        Ok(())
    }

    fn next(&mut self, ctx: &mut BarCtx) -> Result<(), EngineError> {
        let data = ctx.data();
        let i = ctx.bar_index();

        self.visible_lens.push(data.len());
        self.latest_closes.push(data.close()[-1]);
        self.latest_indicator.push(ctx.ind(self.identity.unwrap())[-1]);

        // Absolute index i+1 would be the first future bar.
        if data.close().get(i as isize + 1).is_some()
            || data.index().get(i as isize + 1).is_some()
            || ctx.ind(self.identity.unwrap()).get(i as isize + 1).is_some()
        {
            self.future_leaks += 1;
        }
        Ok(())
    }
}

#[test]
fn visible_prefix_ends_at_current_bar() {
    let series = synthetic_walk(200, 21);
    let mut strategy = Recorder::new();
    let config = EngineConfig {
        starting_cash: 100_000.0,
        commission: 0.0,
        ..Default::default()
    };
    run_backtest(&series, &mut strategy, &config).unwrap();

    assert_eq!(strategy.visible_lens.len(), 200);
    for (bar, &len) in strategy.visible_lens.iter().enumerate() {
        assert_eq!(len, bar + 1, "prefix length wrong at bar {bar}");
    }
    assert_eq!(strategy.future_leaks, 0);
}

#[test]
fn latest_close_matches_series_bar_for_bar() {
    let series = synthetic_walk(150, 22);
    let mut strategy = Recorder::new();
    let config = EngineConfig {
        starting_cash: 100_000.0,
        commission: 0.0,
        ..Default::default()
    };
    run_backtest(&series, &mut strategy, &config).unwrap();

    for (bar, &close) in strategy.latest_closes.iter().enumerate() {
        assert_eq!(close, series.close()[bar], "close mismatch at bar {bar}");
    }
}

#[test]
fn indicator_view_is_aligned_with_data_view() {
    let series = synthetic_walk(150, 23);
    let mut strategy = Recorder::new();
    let config = EngineConfig {
        starting_cash: 100_000.0,
        commission: 0.0,
        ..Default::default()
    };
    run_backtest(&series, &mut strategy, &config).unwrap();

    assert_eq!(strategy.latest_indicator, strategy.latest_closes);
}

/// A producer that writes values into "future" positions can only push the
/// defined region forward: shorter outputs are left-padded with NaN, so the
/// warm-up computation keeps the loop away from undefined values.
#[test]
fn shifted_indicator_extends_warmup_instead_of_leaking() {
    struct Shifted {
        first_next: Option<usize>,
    }

    impl Strategy for Shifted {
        fn init(&mut self, ctx: &mut InitCtx) -> Result<(), EngineError> {
            ctx.indicator("lagged", &[InputRef::column("close")], |inputs| {
                let close = inputs[0].series().ok_or("expected series")?;
                // "Yesterday's close": one shorter than the series.
                Ok(close[..close.len() - 1].to_vec().into())
            })?;
            Ok(())
        }

        fn next(&mut self, ctx: &mut BarCtx) -> Result<(), EngineError> {
            if self.first_next.is_none() {
                self.first_next = Some(ctx.bar_index());
            }
            Ok(())
        }
    }

    let series = synthetic_walk(50, 24);
    let mut strategy = Shifted { first_next: None };
    let config = EngineConfig::default();
    let result = run_backtest(&series, &mut strategy, &config).unwrap();

    assert_eq!(result.first_active_bar, 1);
    assert_eq!(strategy.first_next, Some(1));
}
