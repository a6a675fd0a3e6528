//! Order types and the pending-order state machine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which way a trade points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1.0 for long, -1.0 for short. Lets P&L formulas share one code path.
    pub fn sign(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

/// Order lifecycle states.
///
/// pending → filled (at the next bar's open)
///         → cancelled (position closed before the fill)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Filled,
    Cancelled,
}

/// A market entry order queued for the next bar's open.
///
/// `size` is whole units of the base asset — the broker rounds incoming
/// sizes and rejects zero before an `Order` is ever constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub side: Side,
    pub size: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub tag: Option<String>,
    pub created_bar: usize,
    pub status: OrderStatus,
}

impl Order {
    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }
}

/// Validation errors raised synchronously from `buy`/`sell`.
#[derive(Debug, Error, PartialEq)]
pub enum OrderError {
    #[error("order size {0} rounds to zero units")]
    ZeroSize(f64),

    #[error("stop-loss {stop} on the wrong side of price {price} for a {side:?} entry")]
    StopOnWrongSide { side: Side, stop: f64, price: f64 },

    #[error("take-profit {target} on the wrong side of price {price} for a {side:?} entry")]
    TargetOnWrongSide { side: Side, target: f64, price: f64 },

    #[error("stop-loss {stop} and take-profit {target} do not straddle price for a {side:?} entry")]
    BracketsInverted { side: Side, stop: f64, target: f64 },

    #[error("order price {0} is not finite")]
    NonFinitePrice(f64),
}

/// Entry parameters passed to `buy`/`sell` on the strategy host.
///
/// Builder-style so call sites read like the brackets they declare:
/// `OrderSpec::units(10).stop_loss(95.0).take_profit(130.0)`.
#[derive(Debug, Clone, Default)]
pub struct OrderSpec {
    pub size: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub tag: Option<String>,
}

impl OrderSpec {
    pub fn units(size: f64) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    pub fn stop_loss(mut self, price: f64) -> Self {
        self.stop_loss = Some(price);
        self
    }

    pub fn take_profit(mut self, price: f64) -> Self {
        self.take_profit = Some(price);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// Why a pending order did not fill. Recorded on the run, never raised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedOrder {
    pub bar: usize,
    pub side: Side,
    pub size: f64,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Cash after the fill would breach the margin floor.
    InsufficientCash,
    /// Gross exposure after the fill would exceed margin × equity.
    ExposureLimit,
}
