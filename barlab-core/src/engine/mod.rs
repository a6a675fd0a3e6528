//! Bar-by-bar event loop — the heart of the engine.
//!
//! Per-bar phases, in contract order (observable to strategies):
//! 1. Settle brackets against the current bar's range
//! 2. Fill orders queued on the previous bar at this bar's open
//! 3. Mark-to-market at the close, append the equity point
//! 4. Strategy `next` over the visible prefix
//!
//! The loop starts at the max indicator warm-up, skips anomalous bars with
//! the equity carried forward, and flattens any open position at the final
//! close.

pub mod host;

pub use host::{BarCtx, InitCtx};

use crate::broker::Broker;
use crate::data::{BarSeries, DataError};
use crate::domain::{OrderError, RejectedOrder, Trade};
use crate::indicators::{IndicatorError, IndicatorRegistry};
use crate::stats::Stats;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Fatal engine errors. Construction/init failures abort the run before
/// the loop starts; errors returned from `next` become an aborted (but
/// reported) run instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("indicator error: {0}")]
    Indicator(#[from] IndicatorError),

    #[error("invalid order: {0}")]
    Order(#[from] OrderError),

    #[error("{0}")]
    Strategy(String),
}

impl EngineError {
    /// Convenience for strategies signalling their own failures.
    pub fn strategy(message: impl Into<String>) -> Self {
        EngineError::Strategy(message.into())
    }
}

/// A trading strategy: register indicators in `init`, trade in `next`.
///
/// `next` runs once per simulated bar. Returning an error stops the run:
/// positions are flattened and the result is flagged as aborted.
pub trait Strategy {
    fn init(&mut self, ctx: &mut InitCtx) -> Result<(), EngineError>;
    fn next(&mut self, ctx: &mut BarCtx) -> Result<(), EngineError>;
}

/// Engine construction options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub starting_cash: f64,
    /// Flat commission as a fraction of notional, charged on entry and exit.
    pub commission: f64,
    /// Max gross exposure as a multiple of equity; 1.0 means no leverage.
    pub margin: f64,
    /// Submitting a new order while a position is open queues a close first.
    pub exclusive_orders: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            starting_cash: 1_000_000.0,
            commission: 0.002,
            margin: 1.0,
            exclusive_orders: false,
        }
    }
}

/// Result of a complete run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub stats: Stats,
    /// Closed-trade ledger in close order.
    pub trades: Vec<Trade>,
    /// Equity at each simulated bar's close (starts at the first active bar).
    pub equity_curve: Vec<f64>,
    pub rejected_orders: Vec<RejectedOrder>,
    /// First bar index at which every indicator was warm.
    pub first_active_bar: usize,
    /// Bars skipped because of non-finite prices.
    pub anomalous_bars: usize,
    pub aborted: bool,
    pub abort_reason: Option<String>,
}

/// Run a strategy over a bar series.
pub fn run_backtest(
    series: &BarSeries,
    strategy: &mut dyn Strategy,
    config: &EngineConfig,
) -> Result<RunResult, EngineError> {
    if series.is_empty() {
        return Err(EngineError::Data(DataError::Empty));
    }

    // Init: the only registration window.
    let mut registry = IndicatorRegistry::new(series.len());
    {
        let mut ctx = InitCtx {
            series,
            registry: &mut registry,
        };
        strategy.init(&mut ctx)?;
    }
    registry.freeze();

    let first_active_bar = registry.max_warmup();
    let mut broker = Broker::new(
        config.starting_cash,
        config.commission,
        config.margin,
        config.exclusive_orders,
    );

    let mut anomalous_bars = 0usize;
    let mut aborted = false;
    let mut abort_reason: Option<String> = None;
    let mut last_good: Option<(usize, f64)> = None;

    for i in first_active_bar..series.len() {
        let bar = series.bar(i);

        if bar.is_anomalous() {
            warn!(bar = i, timestamp = %bar.timestamp, "anomalous bar skipped");
            anomalous_bars += 1;
            broker.carry_equity_forward();
            continue;
        }

        broker.settle_brackets(i, &bar);
        broker.fill_pending(i, &bar);
        broker.mark_to_market(bar.close);
        last_good = Some((i, bar.close));

        let mut ctx = BarCtx {
            series,
            registry: &registry,
            broker: &mut broker,
            i,
        };
        if let Err(err) = strategy.next(&mut ctx) {
            warn!(bar = i, error = %err, "strategy aborted the run");
            aborted = true;
            abort_reason = Some(err.to_string());
            break;
        }
    }

    // Flatten whatever is still open at the last marked close.
    if let Some((i, close)) = last_good {
        broker.finalize(i, close);
    }

    let (ledger, trades, rejected_orders) = broker.into_parts();
    let equity_curve = ledger.into_equity_curve();
    let stats = Stats::compute(
        &equity_curve,
        &trades,
        series.timestamps(),
        config.starting_cash,
    );

    Ok(RunResult {
        stats,
        trades,
        equity_curve,
        rejected_orders,
        first_active_bar,
        anomalous_bars,
        aborted,
        abort_reason,
    })
}
