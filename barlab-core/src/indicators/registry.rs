//! The registry itself: input materialisation, one-shot evaluation,
//! NaN padding and warm-up bookkeeping.

use super::IndicatorError;
use crate::data::{BarSeries, ColumnView};

/// Reference to a producer input, resolved by the registry at registration
/// time. Producers never see views or handles — each reference is
/// materialised into an owned array (or scalar) before the call, which
/// rules out cyclic indicator definitions by construction.
#[derive(Debug, Clone)]
pub enum InputRef {
    /// A bar-series column by lower-cased name ("close", "funding_rate", ...).
    Column(String),
    /// The output of a previously registered indicator.
    Indicator(IndicatorHandle),
    /// A plain parameter.
    Scalar(f64),
}

impl InputRef {
    pub fn column(name: impl Into<String>) -> Self {
        InputRef::Column(name.into())
    }
}

/// A materialised producer input.
#[derive(Debug, Clone)]
pub enum InputValue {
    Series(Vec<f64>),
    Scalar(f64),
}

impl InputValue {
    pub fn series(&self) -> Option<&[f64]> {
        match self {
            InputValue::Series(v) => Some(v),
            InputValue::Scalar(_) => None,
        }
    }

    pub fn scalar(&self) -> Option<f64> {
        match self {
            InputValue::Scalar(s) => Some(*s),
            InputValue::Series(_) => None,
        }
    }
}

/// What a producer returns: one aligned sequence or several.
pub enum IndicatorOutput {
    Single(Vec<f64>),
    Multi(Vec<Vec<f64>>),
}

impl From<Vec<f64>> for IndicatorOutput {
    fn from(values: Vec<f64>) -> Self {
        IndicatorOutput::Single(values)
    }
}

impl From<Vec<Vec<f64>>> for IndicatorOutput {
    fn from(values: Vec<Vec<f64>>) -> Self {
        IndicatorOutput::Multi(values)
    }
}

/// Opaque handle to one registered output sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorHandle(pub(crate) usize);

#[derive(Debug)]
struct IndicatorSeries {
    name: String,
    values: Vec<f64>,
    warmup: usize,
}

/// Write-once cache of aligned indicator arrays.
///
/// Registered during `Strategy::init`, frozen before the bar loop starts,
/// read-only thereafter. Every stored array has exactly the bar series
/// length; short producer outputs are left-padded with NaN.
#[derive(Debug)]
pub struct IndicatorRegistry {
    series_len: usize,
    frozen: bool,
    auto_names: usize,
    outputs: Vec<IndicatorSeries>,
}

impl IndicatorRegistry {
    pub fn new(series_len: usize) -> Self {
        Self {
            series_len,
            frozen: false,
            auto_names: 0,
            outputs: Vec::new(),
        }
    }

    /// Register a producer. The producer runs exactly once, here, against
    /// materialised inputs; its outputs are cached under `name` (multi
    /// outputs get `name_k` suffixes, a missing name auto-generates one).
    pub fn register<F>(
        &mut self,
        series: &BarSeries,
        name: Option<&str>,
        inputs: &[InputRef],
        producer: F,
    ) -> Result<Vec<IndicatorHandle>, IndicatorError>
    where
        F: FnOnce(&[InputValue]) -> Result<IndicatorOutput, String>,
    {
        if self.frozen {
            return Err(IndicatorError::RegistryFrozen);
        }

        let name = match name {
            Some(n) => n.to_string(),
            None => {
                self.auto_names += 1;
                format!("ind_{}", self.auto_names)
            }
        };

        let materialised = self.materialise(series, &name, inputs)?;

        let output = producer(&materialised).map_err(|message| IndicatorError::Producer {
            name: name.clone(),
            message,
        })?;

        let sequences = match output {
            IndicatorOutput::Single(v) => vec![v],
            IndicatorOutput::Multi(vs) => vs,
        };
        if sequences.is_empty() {
            return Err(IndicatorError::Producer {
                name,
                message: "producer returned no sequences".to_string(),
            });
        }
        let multi = sequences.len() > 1;

        let mut handles = Vec::with_capacity(sequences.len());
        for (k, mut values) in sequences.into_iter().enumerate() {
            let out_name = if multi {
                format!("{name}_{k}")
            } else {
                name.clone()
            };

            if values.len() > self.series_len {
                return Err(IndicatorError::LengthMismatch {
                    name: out_name,
                    got: values.len(),
                    expected: self.series_len,
                });
            }
            if values.len() < self.series_len {
                let pad = self.series_len - values.len();
                let mut padded = vec![f64::NAN; pad];
                padded.append(&mut values);
                values = padded;
            }

            let warmup = values.iter().take_while(|v| v.is_nan()).count();
            handles.push(IndicatorHandle(self.outputs.len()));
            self.outputs.push(IndicatorSeries {
                name: out_name,
                values,
                warmup,
            });
        }
        Ok(handles)
    }

    fn materialise(
        &self,
        series: &BarSeries,
        name: &str,
        inputs: &[InputRef],
    ) -> Result<Vec<InputValue>, IndicatorError> {
        inputs
            .iter()
            .map(|input| match input {
                InputRef::Column(column) => series
                    .column(column)
                    .map(|c| InputValue::Series(c.to_vec()))
                    .ok_or_else(|| IndicatorError::UnknownColumn {
                        name: name.to_string(),
                        column: column.clone(),
                    }),
                InputRef::Indicator(handle) => {
                    Ok(InputValue::Series(self.outputs[handle.0].values.clone()))
                }
                InputRef::Scalar(s) => Ok(InputValue::Scalar(*s)),
            })
            .collect()
    }

    /// No further registrations; called by the engine after init.
    pub(crate) fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn count(&self) -> usize {
        self.outputs.len()
    }

    pub fn name(&self, handle: IndicatorHandle) -> &str {
        &self.outputs[handle.0].name
    }

    pub fn values(&self, handle: IndicatorHandle) -> &[f64] {
        &self.outputs[handle.0].values
    }

    pub fn warmup(&self, handle: IndicatorHandle) -> usize {
        self.outputs[handle.0].warmup
    }

    /// First bar at which every registered indicator is defined.
    pub fn max_warmup(&self) -> usize {
        self.outputs.iter().map(|o| o.warmup).max().unwrap_or(0)
    }

    /// Prefix view through bar `i`, same indexing rules as the data views.
    pub fn view(&self, handle: IndicatorHandle, i: usize) -> ColumnView<'_> {
        ColumnView::new(&self.outputs[handle.0].values[..i + 1])
    }
}
