//! Indicator registry — user-supplied producers evaluated once over the
//! bar series, cached as aligned arrays.

pub mod registry;

pub use registry::{IndicatorHandle, IndicatorOutput, IndicatorRegistry, InputRef, InputValue};

use thiserror::Error;

/// Producer failures and alignment violations. Fatal at init time.
#[derive(Debug, Error)]
pub enum IndicatorError {
    #[error("indicator '{name}': producer failed: {message}")]
    Producer { name: String, message: String },

    #[error("indicator '{name}': {got} values for a series of {expected} bars")]
    LengthMismatch {
        name: String,
        got: usize,
        expected: usize,
    },

    #[error("indicator '{name}': unknown input column '{column}'")]
    UnknownColumn { name: String, column: String },

    #[error("indicators may only be registered during init")]
    RegistryFrozen,
}
