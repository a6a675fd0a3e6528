//! Strategy host — the two context types handed to strategy code.
//!
//! `InitCtx` exists only during `Strategy::init` and is the sole place
//! indicators can be registered. `BarCtx` is rebuilt for every simulated
//! bar and exposes exactly the visible prefix: bars `0..=i`, indicator
//! values `0..=i`, and the broker surface (equity, position, orders).

use crate::broker::Broker;
use crate::data::{BarSeries, ColumnView, DataView};
use crate::domain::{OrderError, OrderSpec, Position, Side, Trade};
use crate::indicators::{
    IndicatorError, IndicatorHandle, IndicatorOutput, IndicatorRegistry, InputRef, InputValue,
};

/// Init-time surface: full series access and indicator registration.
pub struct InitCtx<'a> {
    pub(crate) series: &'a BarSeries,
    pub(crate) registry: &'a mut IndicatorRegistry,
}

impl<'a> InitCtx<'a> {
    /// The full bar series. Strategies may inspect it freely here; during
    /// the loop only prefix views are reachable.
    pub fn data(&self) -> &BarSeries {
        self.series
    }

    /// Register a single-output indicator. The producer runs once, now.
    pub fn indicator<F>(
        &mut self,
        name: impl Into<String>,
        inputs: &[InputRef],
        producer: F,
    ) -> Result<IndicatorHandle, IndicatorError>
    where
        F: FnOnce(&[InputValue]) -> Result<IndicatorOutput, String>,
    {
        let name = name.into();
        let handles = self
            .registry
            .register(self.series, Some(name.as_str()), inputs, producer)?;
        Ok(handles[0])
    }

    /// Register a multi-output indicator; one handle per returned sequence.
    pub fn indicator_multi<F>(
        &mut self,
        name: impl Into<String>,
        inputs: &[InputRef],
        producer: F,
    ) -> Result<Vec<IndicatorHandle>, IndicatorError>
    where
        F: FnOnce(&[InputValue]) -> Result<IndicatorOutput, String>,
    {
        let name = name.into();
        self.registry
            .register(self.series, Some(name.as_str()), inputs, producer)
    }
}

/// Per-bar surface: prefix views plus broker operations.
pub struct BarCtx<'a> {
    pub(crate) series: &'a BarSeries,
    pub(crate) registry: &'a IndicatorRegistry,
    pub(crate) broker: &'a mut Broker,
    pub(crate) i: usize,
}

impl<'a> BarCtx<'a> {
    /// Bars `0..=i`; `data().close()[-1]` is the current bar's close.
    pub fn data(&self) -> DataView<'a> {
        self.series.view(self.i)
    }

    /// Indicator values `0..=i`, aligned with `data()`.
    ///
    /// The view borrows the registry, not the context, so strategies can
    /// hold it across `buy`/`sell`/`close_position` calls.
    pub fn ind(&self, handle: IndicatorHandle) -> ColumnView<'a> {
        self.registry.view(handle, self.i)
    }

    pub fn bar_index(&self) -> usize {
        self.i
    }

    /// Mark-to-market equity at this bar's close.
    pub fn equity(&self) -> f64 {
        self.broker.equity()
    }

    pub fn position(&self) -> Position {
        self.broker.position()
    }

    /// Currently open trades (handles into the broker's book).
    pub fn trades(&self) -> &[Trade] {
        self.broker.open_trades()
    }

    /// Queue a long market entry for the next bar's open.
    pub fn buy(&mut self, spec: OrderSpec) -> Result<u64, OrderError> {
        self.broker.submit(Side::Long, spec, self.i)
    }

    /// Queue a short market entry for the next bar's open.
    pub fn sell(&mut self, spec: OrderSpec) -> Result<u64, OrderError> {
        self.broker.submit(Side::Short, spec, self.i)
    }

    /// Schedule a flatten at the next bar's open.
    pub fn close_position(&mut self) {
        self.broker.close_position();
    }
}
