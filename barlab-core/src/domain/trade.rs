//! Trade — an entry that is open until a bracket, the strategy, or the
//! end of the run closes it.

use super::order::Side;
use serde::{Deserialize, Serialize};

/// How a trade left the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Strategy,
    EndOfRun,
}

/// One round trip (or an open leg of one).
///
/// While the trade is open `exit_*` fields are `None` and `pl` reflects the
/// last mark-to-market. On close the exit fields are frozen and the record
/// moves to the ledger, immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub side: Side,
    pub size: f64,

    pub entry_bar: usize,
    pub entry_price: f64,

    pub exit_bar: Option<usize>,
    pub exit_price: Option<f64>,
    pub exit_reason: Option<ExitReason>,

    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub tag: Option<String>,

    pub entry_commission: f64,
    pub exit_commission: f64,

    /// Net P&L: realized once closed, mark-to-market while open.
    pub pl: f64,
}

impl Trade {
    pub fn open(
        side: Side,
        size: f64,
        entry_bar: usize,
        entry_price: f64,
        entry_commission: f64,
    ) -> Self {
        Self {
            side,
            size,
            entry_bar,
            entry_price,
            exit_bar: None,
            exit_price: None,
            exit_reason: None,
            stop_loss: None,
            take_profit: None,
            tag: None,
            entry_commission,
            exit_commission: 0.0,
            pl: -entry_commission,
        }
    }

    pub fn is_open(&self) -> bool {
        self.exit_bar.is_none()
    }

    pub fn is_long(&self) -> bool {
        self.side == Side::Long
    }

    pub fn is_short(&self) -> bool {
        self.side == Side::Short
    }

    /// Gross unrealized P&L at `price`, before commissions.
    pub fn gross_pl_at(&self, price: f64) -> f64 {
        self.side.sign() * self.size * (price - self.entry_price)
    }

    /// Net unrealized P&L at `price`: gross minus commissions paid so far.
    pub fn net_pl_at(&self, price: f64) -> f64 {
        self.gross_pl_at(price) - self.entry_commission - self.exit_commission
    }

    /// Freeze the exit leg. `pl` becomes realized net P&L.
    pub fn close(&mut self, bar: usize, price: f64, commission: f64, reason: ExitReason) {
        debug_assert!(bar >= self.entry_bar, "exit bar precedes entry bar");
        self.exit_bar = Some(bar);
        self.exit_price = Some(price);
        self.exit_reason = Some(reason);
        self.exit_commission = commission;
        self.pl = self.gross_pl_at(price) - self.entry_commission - commission;
    }

    pub fn is_winner(&self) -> bool {
        self.pl > 0.0
    }

    /// Return on entry notional, e.g. 0.05 for +5%.
    pub fn return_pct(&self) -> f64 {
        let notional = self.entry_price * self.size;
        if notional == 0.0 {
            return 0.0;
        }
        self.pl / notional
    }
}
