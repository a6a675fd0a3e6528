//! Broker — pending orders, bracket settlement, fills, and accounting.
//!
//! The engine drives one broker per run through a fixed per-bar sequence:
//! `settle_brackets` → `fill_pending` → `mark_to_market`, then hands
//! control to the strategy, whose `buy`/`sell`/`close_position` calls
//! mutate the queue for the next bar. The ordering is part of the engine
//! contract and is observable to strategies.

pub mod ledger;

pub use ledger::CashLedger;

use crate::domain::{
    Bar, ExitReason, Order, OrderError, OrderSpec, OrderStatus, Position, RejectReason,
    RejectedOrder, Side, Trade,
};
use tracing::{debug, warn};

/// Broker state for one run.
#[derive(Debug)]
pub struct Broker {
    commission_rate: f64,
    margin: f64,
    exclusive_orders: bool,

    ledger: CashLedger,
    orders: Vec<Order>,
    next_order_id: u64,
    close_pending: bool,

    open_trades: Vec<Trade>,
    closed_trades: Vec<Trade>,
    rejected: Vec<RejectedOrder>,

    /// Close of the most recently marked bar; the reference price for
    /// bracket validation and position snapshots.
    last_close: f64,
}

impl Broker {
    pub fn new(starting_cash: f64, commission_rate: f64, margin: f64, exclusive_orders: bool) -> Self {
        Self {
            commission_rate,
            margin,
            exclusive_orders,
            ledger: CashLedger::new(starting_cash),
            orders: Vec::new(),
            next_order_id: 1,
            close_pending: false,
            open_trades: Vec::new(),
            closed_trades: Vec::new(),
            rejected: Vec::new(),
            last_close: f64::NAN,
        }
    }

    // ─── Strategy-facing operations ─────────────────────────────────

    /// Queue a market entry for the next bar's open. Validates size and
    /// brackets synchronously; cash sufficiency is only known at fill time.
    pub fn submit(&mut self, side: Side, spec: OrderSpec, bar: usize) -> Result<u64, OrderError> {
        let size = spec.size.round();
        if size <= 0.0 {
            return Err(OrderError::ZeroSize(spec.size));
        }

        // Entry fills at the next open; the latest visible close is the
        // reference price for side checks.
        let reference = self.last_close;
        if let Some(stop) = spec.stop_loss {
            if !stop.is_finite() {
                return Err(OrderError::NonFinitePrice(stop));
            }
            let wrong = match side {
                Side::Long => stop >= reference,
                Side::Short => stop <= reference,
            };
            if wrong {
                return Err(OrderError::StopOnWrongSide {
                    side,
                    stop,
                    price: reference,
                });
            }
        }
        if let Some(target) = spec.take_profit {
            if !target.is_finite() {
                return Err(OrderError::NonFinitePrice(target));
            }
            let wrong = match side {
                Side::Long => target <= reference,
                Side::Short => target >= reference,
            };
            if wrong {
                return Err(OrderError::TargetOnWrongSide {
                    side,
                    target,
                    price: reference,
                });
            }
        }
        if let (Some(stop), Some(target)) = (spec.stop_loss, spec.take_profit) {
            let inverted = match side {
                Side::Long => stop >= target,
                Side::Short => stop <= target,
            };
            if inverted {
                return Err(OrderError::BracketsInverted {
                    side,
                    stop,
                    target,
                });
            }
        }

        if self.exclusive_orders {
            // One order at a time: drop earlier pending entries and close
            // any open position before the new entry fills.
            for order in self.orders.iter_mut().filter(|o| o.is_pending()) {
                order.status = OrderStatus::Cancelled;
            }
            if !self.open_trades.is_empty() {
                self.close_pending = true;
            }
        }

        let id = self.next_order_id;
        self.next_order_id += 1;
        self.orders.push(Order {
            id,
            side,
            size,
            stop_loss: spec.stop_loss,
            take_profit: spec.take_profit,
            tag: spec.tag,
            created_bar: bar,
            status: OrderStatus::Pending,
        });
        Ok(id)
    }

    /// Schedule a flatten at the next bar's open and cancel pending entries.
    pub fn close_position(&mut self) {
        if !self.open_trades.is_empty() {
            self.close_pending = true;
        }
        for order in self.orders.iter_mut().filter(|o| o.is_pending()) {
            order.status = OrderStatus::Cancelled;
        }
    }

    // ─── Engine-facing per-bar sequence ─────────────────────────────

    /// Phase 1: check each open trade's brackets against this bar's range.
    ///
    /// When both the stop and the target lie inside the bar the data cannot
    /// say which was touched first; the stop wins. A bar that opens beyond
    /// a bracket fills at the open instead of the bracket level.
    pub fn settle_brackets(&mut self, i: usize, bar: &Bar) {
        let rate = self.commission_rate;
        let mut settled: Vec<(usize, f64, ExitReason)> = Vec::new();

        for (idx, trade) in self.open_trades.iter().enumerate() {
            let stop_fill = trade.stop_loss.and_then(|stop| match trade.side {
                Side::Long if bar.low <= stop => Some(bar.open.min(stop)),
                Side::Short if bar.high >= stop => Some(bar.open.max(stop)),
                _ => None,
            });
            let target_fill = trade.take_profit.and_then(|target| match trade.side {
                Side::Long if bar.high >= target => Some(bar.open.max(target)),
                Side::Short if bar.low <= target => Some(bar.open.min(target)),
                _ => None,
            });

            match (stop_fill, target_fill) {
                (Some(price), _) => settled.push((idx, price, ExitReason::StopLoss)),
                (None, Some(price)) => settled.push((idx, price, ExitReason::TakeProfit)),
                (None, None) => {}
            }
        }

        // Close from the back so indices stay valid.
        for (idx, price, reason) in settled.into_iter().rev() {
            let mut trade = self.open_trades.swap_remove(idx);
            let commission = rate * trade.size * price;
            self.close_trade_in_place(&mut trade, i, price, commission, reason);
            self.closed_trades.push(trade);
        }
    }

    /// Phase 2: fill queued orders at this bar's open.
    pub fn fill_pending(&mut self, i: usize, bar: &Bar) {
        if self.close_pending {
            self.flatten_all(i, bar.open, ExitReason::Strategy);
            self.close_pending = false;
        }

        let pending: Vec<usize> = self
            .orders
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_pending())
            .map(|(idx, _)| idx)
            .collect();

        for idx in pending {
            let order = self.orders[idx].clone();

            // One side open at a time: an entry against an open opposite
            // position flattens it at the same open first.
            if let Some(open_side) = self.open_trades.first().map(|t| t.side) {
                if open_side != order.side {
                    self.flatten_all(i, bar.open, ExitReason::Strategy);
                }
            }

            let price = bar.open;
            let notional = order.size * price;
            let commission = self.commission_rate * notional;

            if let Some(reason) = self.entry_rejection(order.side, notional, commission, price) {
                warn!(
                    bar = i,
                    side = ?order.side,
                    size = order.size,
                    ?reason,
                    "order rejected"
                );
                self.orders[idx].status = OrderStatus::Cancelled;
                self.rejected.push(RejectedOrder {
                    bar: i,
                    side: order.side,
                    size: order.size,
                    reason,
                });
                continue;
            }

            self.ledger.apply_entry(order.side, notional, commission);
            let mut trade = Trade::open(order.side, order.size, i, price, commission);
            trade.stop_loss = order.stop_loss;
            trade.take_profit = order.take_profit;
            trade.tag = order.tag.clone();
            self.open_trades.push(trade);
            self.orders[idx].status = OrderStatus::Filled;

            debug!(bar = i, side = ?order.side, size = order.size, price, "order filled");
        }
    }

    /// Phase 3: mark open trades at the close and append the equity point.
    pub fn mark_to_market(&mut self, close: f64) -> f64 {
        self.last_close = close;
        let equity = self.equity_at(close);
        self.ledger.record_equity(equity);
        equity
    }

    /// Anomalous bar: no marking is possible, so the equity point carries
    /// forward at its last value.
    pub fn carry_equity_forward(&mut self) {
        let equity = self
            .ledger
            .equity_curve()
            .last()
            .copied()
            .unwrap_or(self.ledger.starting_cash());
        self.ledger.record_equity(equity);
    }

    /// Flatten everything at `price` (manual close, reversal, end of run).
    pub fn flatten_all(&mut self, i: usize, price: f64, reason: ExitReason) {
        let rate = self.commission_rate;
        let mut trades = std::mem::take(&mut self.open_trades);
        for trade in trades.iter_mut() {
            let commission = rate * trade.size * price;
            self.close_trade_in_place(trade, i, price, commission, reason);
        }
        self.closed_trades.append(&mut trades);
    }

    /// End-of-run flatten at the final close; restates the final equity
    /// point so the curve reflects the exit commissions.
    pub fn finalize(&mut self, i: usize, close: f64) {
        self.flatten_all(i, close, ExitReason::EndOfRun);
        for order in self.orders.iter_mut().filter(|o| o.is_pending()) {
            order.status = OrderStatus::Cancelled;
        }
        let equity = self.equity_at(close);
        self.ledger.restate_last_equity(equity);
    }

    // ─── Accessors ──────────────────────────────────────────────────

    pub fn equity(&self) -> f64 {
        self.equity_at(self.last_close)
    }

    pub fn cash(&self) -> f64 {
        self.ledger.cash()
    }

    pub fn position(&self) -> Position {
        Position::from_trades(&self.open_trades, self.last_close)
    }

    pub fn open_trades(&self) -> &[Trade] {
        &self.open_trades
    }

    pub fn closed_trades(&self) -> &[Trade] {
        &self.closed_trades
    }

    pub fn rejected_orders(&self) -> &[RejectedOrder] {
        &self.rejected
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn ledger(&self) -> &CashLedger {
        &self.ledger
    }

    pub fn into_parts(self) -> (CashLedger, Vec<Trade>, Vec<RejectedOrder>) {
        (self.ledger, self.closed_trades, self.rejected)
    }

    // ─── Internals ──────────────────────────────────────────────────

    fn equity_at(&self, price: f64) -> f64 {
        let position_value: f64 = self
            .open_trades
            .iter()
            .map(|t| t.side.sign() * t.size * price)
            .sum();
        self.ledger.cash() + position_value
    }

    /// Margin checks at fill time. Long entries must keep cash above the
    /// floor `-(margin - 1) × starting cash`; all entries must keep gross
    /// exposure within `margin × equity`.
    fn entry_rejection(
        &self,
        side: Side,
        notional: f64,
        commission: f64,
        price: f64,
    ) -> Option<RejectReason> {
        let floor = -(self.margin - 1.0) * self.ledger.starting_cash();
        if side == Side::Long {
            let cash_after = self.ledger.cash() - notional - commission;
            if cash_after < floor - 1e-9 {
                return Some(RejectReason::InsufficientCash);
            }
        }

        let open_exposure: f64 = self
            .open_trades
            .iter()
            .map(|t| t.size * t.entry_price)
            .sum();
        let equity = self.equity_at(price);
        if open_exposure + notional > self.margin * equity + 1e-9 {
            return Some(RejectReason::ExposureLimit);
        }
        None
    }

    fn close_trade_in_place(
        &mut self,
        trade: &mut Trade,
        i: usize,
        price: f64,
        commission: f64,
        reason: ExitReason,
    ) {
        trade.close(i, price, commission, reason);
        self.ledger
            .apply_exit(trade.side, trade.size * price, commission, trade.pl);
        debug!(bar = i, side = ?trade.side, size = trade.size, price, ?reason, "trade closed");
    }
}
