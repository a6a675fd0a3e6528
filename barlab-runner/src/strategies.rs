//! Strategy presets — the loader shim that turns a config name plus a
//! parameter map into a runnable `Strategy`.
//!
//! These are deliberately small: each preset exercises the host surface
//! (indicator registration, prefix views, sizing, brackets) the way the
//! strategy scripts this engine targets do.

use barlab_core::domain::OrderSpec;
use barlab_core::engine::{BarCtx, EngineError, InitCtx, Strategy};
use barlab_core::indicators::{IndicatorHandle, InputRef, InputValue};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("unknown strategy '{0}' (valid: sma_cross, channel_breakout, buy_hold)")]
    Unknown(String),

    #[error("strategy '{strategy}': invalid parameters: {message}")]
    InvalidParams {
        strategy: &'static str,
        message: String,
    },
}

/// Build a strategy preset by name.
pub fn build_strategy(
    name: &str,
    params: &BTreeMap<String, f64>,
) -> Result<Box<dyn Strategy>, StrategyError> {
    match name {
        "sma_cross" => Ok(Box::new(SmaCross::from_params(params)?)),
        "channel_breakout" => Ok(Box::new(ChannelBreakout::from_params(params)?)),
        "buy_hold" => Ok(Box::new(BuyHold::from_params(params))),
        other => Err(StrategyError::Unknown(other.to_string())),
    }
}

fn param(params: &BTreeMap<String, f64>, key: &str, default: f64) -> f64 {
    params.get(key).copied().unwrap_or(default)
}

/// Rolling mean with a NaN warm-up prefix.
fn sma(inputs: &[InputValue]) -> Result<barlab_core::indicators::IndicatorOutput, String> {
    let close = inputs[0].series().ok_or("expected close series")?;
    let period = inputs[1].scalar().ok_or("expected period scalar")? as usize;
    if period == 0 {
        return Err("period must be positive".to_string());
    }
    let mut out = vec![f64::NAN; close.len()];
    let mut acc = 0.0;
    for (i, &value) in close.iter().enumerate() {
        acc += value;
        if i >= period {
            acc -= close[i - period];
        }
        if i + 1 >= period {
            out[i] = acc / period as f64;
        }
    }
    Ok(out.into())
}

// ─── sma_cross ──────────────────────────────────────────────────────

/// Long when the fast average crosses above the slow one, flat on the
/// reverse cross. Position size is a fraction of current equity.
#[derive(Debug)]
pub struct SmaCross {
    fast: usize,
    slow: usize,
    size_pct: f64,
    fast_ma: Option<IndicatorHandle>,
    slow_ma: Option<IndicatorHandle>,
}

impl SmaCross {
    pub fn from_params(params: &BTreeMap<String, f64>) -> Result<Self, StrategyError> {
        let fast = param(params, "fast", 10.0) as usize;
        let slow = param(params, "slow", 30.0) as usize;
        if fast == 0 || slow == 0 || fast >= slow {
            return Err(StrategyError::InvalidParams {
                strategy: "sma_cross",
                message: format!("need 0 < fast < slow, got fast={fast} slow={slow}"),
            });
        }
        Ok(Self {
            fast,
            slow,
            size_pct: param(params, "size_pct", 0.9),
            fast_ma: None,
            slow_ma: None,
        })
    }
}

impl Strategy for SmaCross {
    fn init(&mut self, ctx: &mut InitCtx) -> Result<(), EngineError> {
        self.fast_ma = Some(ctx.indicator(
            format!("sma{}", self.fast),
            &[InputRef::column("close"), InputRef::Scalar(self.fast as f64)],
            sma,
        )?);
        self.slow_ma = Some(ctx.indicator(
            format!("sma{}", self.slow),
            &[InputRef::column("close"), InputRef::Scalar(self.slow as f64)],
            sma,
        )?);
        Ok(())
    }

    fn next(&mut self, ctx: &mut BarCtx) -> Result<(), EngineError> {
        let fast = ctx.ind(self.fast_ma.unwrap());
        let slow = ctx.ind(self.slow_ma.unwrap());

        let (Some(fast_prev), Some(slow_prev)) = (fast.get(-2), slow.get(-2)) else {
            return Ok(());
        };
        if fast_prev.is_nan() || slow_prev.is_nan() {
            return Ok(());
        }

        let crossed_up = fast_prev <= slow_prev && fast[-1] > slow[-1];
        let crossed_down = fast_prev >= slow_prev && fast[-1] < slow[-1];
        let position = ctx.position();

        if crossed_up && !position.is_open() {
            let close = ctx.data().close()[-1];
            let units = (ctx.equity() * self.size_pct / close).floor();
            if units >= 1.0 {
                ctx.buy(OrderSpec::units(units).tag("sma_cross"))?;
            }
        } else if crossed_down && position.is_open() {
            ctx.close_position();
        }
        Ok(())
    }
}

// ─── channel_breakout ───────────────────────────────────────────────

/// Buys a close above the prior `lookback`-bar high with a stop at the
/// prior low and a multiple-of-risk target. Size follows the usual
/// risk-fraction rule: `round(risk_amount / per_unit_risk)`.
pub struct ChannelBreakout {
    lookback: usize,
    risk_pct: f64,
    reward_mult: f64,
    upper: Option<IndicatorHandle>,
    lower: Option<IndicatorHandle>,
}

impl ChannelBreakout {
    pub fn from_params(params: &BTreeMap<String, f64>) -> Result<Self, StrategyError> {
        let lookback = param(params, "lookback", 20.0) as usize;
        if lookback == 0 {
            return Err(StrategyError::InvalidParams {
                strategy: "channel_breakout",
                message: "lookback must be positive".to_string(),
            });
        }
        let risk_pct = param(params, "risk_pct", 0.01);
        if !(0.0..=1.0).contains(&risk_pct) {
            return Err(StrategyError::InvalidParams {
                strategy: "channel_breakout",
                message: format!("risk_pct must be in (0, 1], got {risk_pct}"),
            });
        }
        Ok(Self {
            lookback,
            risk_pct,
            reward_mult: param(params, "reward_mult", 2.0),
            upper: None,
            lower: None,
        })
    }
}

impl Strategy for ChannelBreakout {
    fn init(&mut self, ctx: &mut InitCtx) -> Result<(), EngineError> {
        let lookback = self.lookback;
        // Channel over the *prior* lookback bars — the current bar is
        // excluded so a breakout close can actually exceed the upper band.
        let handles = ctx.indicator_multi(
            "channel",
            &[InputRef::column("high"), InputRef::column("low")],
            move |inputs| {
                let high = inputs[0].series().ok_or("expected high series")?;
                let low = inputs[1].series().ok_or("expected low series")?;
                let n = high.len();
                let mut upper = vec![f64::NAN; n];
                let mut lower = vec![f64::NAN; n];
                for i in lookback..n {
                    let window = i - lookback..i;
                    upper[i] = high[window.clone()].iter().fold(f64::MIN, |a, &b| a.max(b));
                    lower[i] = low[window].iter().fold(f64::MAX, |a, &b| a.min(b));
                }
                Ok(vec![upper, lower].into())
            },
        )?;
        self.upper = Some(handles[0]);
        self.lower = Some(handles[1]);
        Ok(())
    }

    fn next(&mut self, ctx: &mut BarCtx) -> Result<(), EngineError> {
        if ctx.position().is_open() {
            return Ok(());
        }

        let close = ctx.data().close()[-1];
        let upper = ctx.ind(self.upper.unwrap())[-1];
        let lower = ctx.ind(self.lower.unwrap())[-1];
        if close <= upper {
            return Ok(());
        }

        let stop = lower;
        let per_unit_risk = close - stop;
        if per_unit_risk <= 0.0 {
            return Ok(());
        }
        let units = (ctx.equity() * self.risk_pct / per_unit_risk).round();
        if units < 1.0 {
            // ATR-style sizing rounds to zero in quiet regimes; skip rather
            // than submit an order the broker must reject.
            return Ok(());
        }

        let target = close + self.reward_mult * per_unit_risk;
        ctx.buy(
            OrderSpec::units(units)
                .stop_loss(stop)
                .take_profit(target)
                .tag("channel_breakout"),
        )?;
        Ok(())
    }
}

// ─── buy_hold ───────────────────────────────────────────────────────

/// Buys once on the first bar and holds to the end of the run.
pub struct BuyHold {
    size_pct: f64,
    bought: bool,
}

impl BuyHold {
    pub fn from_params(params: &BTreeMap<String, f64>) -> Self {
        Self {
            size_pct: param(params, "size_pct", 0.9),
            bought: false,
        }
    }
}

impl Strategy for BuyHold {
    fn init(&mut self, _ctx: &mut InitCtx) -> Result<(), EngineError> {
        Ok(())
    }

    fn next(&mut self, ctx: &mut BarCtx) -> Result<(), EngineError> {
        if self.bought {
            return Ok(());
        }
        let close = ctx.data().close()[-1];
        let units = (ctx.equity() * self.size_pct / close).floor();
        if units >= 1.0 {
            ctx.buy(OrderSpec::units(units).tag("buy_hold"))?;
        }
        self.bought = true;
        Ok(())
    }
}
