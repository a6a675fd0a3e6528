//! BarSeries — immutable column-oriented store of OHLCV bars.

use super::DataError;
use crate::domain::Bar;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::io::Write;
use std::ops::Index;

/// Column-oriented OHLCV store with an ordered timestamp index.
///
/// Created once per run and shared read-only by the indicator registry,
/// the strategy, and the broker. Extra input columns (funding rates, open
/// interest, ...) are retained under their lower-cased names.
#[derive(Debug, Clone)]
pub struct BarSeries {
    timestamp_name: String,
    timestamps: Vec<DateTime<Utc>>,
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
    volume: Vec<f64>,
    extras: BTreeMap<String, Vec<f64>>,
}

impl BarSeries {
    /// Assemble a series from parsed columns. All columns must share one
    /// length; timestamps must already be sorted.
    pub(crate) fn from_columns(
        timestamp_name: String,
        timestamps: Vec<DateTime<Utc>>,
        open: Vec<f64>,
        high: Vec<f64>,
        low: Vec<f64>,
        close: Vec<f64>,
        volume: Vec<f64>,
        extras: BTreeMap<String, Vec<f64>>,
    ) -> Result<Self, DataError> {
        if timestamps.is_empty() {
            return Err(DataError::Empty);
        }
        let expected = timestamps.len();
        for (name, col) in [
            ("open", &open),
            ("high", &high),
            ("low", &low),
            ("close", &close),
            ("volume", &volume),
        ] {
            if col.len() != expected {
                return Err(DataError::ColumnLength {
                    column: name.to_string(),
                    got: col.len(),
                    expected,
                });
            }
        }
        for (name, col) in &extras {
            if col.len() != expected {
                return Err(DataError::ColumnLength {
                    column: name.clone(),
                    got: col.len(),
                    expected,
                });
            }
        }
        Ok(Self {
            timestamp_name,
            timestamps,
            open,
            high,
            low,
            close,
            volume,
            extras,
        })
    }

    /// Build a series from bars. Rejects decreasing timestamps — callers
    /// that want reordering should go through `load::load_csv`, which sorts.
    pub fn from_bars(bars: Vec<Bar>) -> Result<Self, DataError> {
        if bars.is_empty() {
            return Err(DataError::Empty);
        }
        for (i, pair) in bars.windows(2).enumerate() {
            if pair[1].timestamp < pair[0].timestamp {
                return Err(DataError::UnorderedTimestamps(i + 1));
            }
        }
        let n = bars.len();
        let mut timestamps = Vec::with_capacity(n);
        let mut open = Vec::with_capacity(n);
        let mut high = Vec::with_capacity(n);
        let mut low = Vec::with_capacity(n);
        let mut close = Vec::with_capacity(n);
        let mut volume = Vec::with_capacity(n);
        for bar in bars {
            timestamps.push(bar.timestamp);
            open.push(bar.open);
            high.push(bar.high);
            low.push(bar.low);
            close.push(bar.close);
            volume.push(bar.volume);
        }
        Self::from_columns(
            "datetime".to_string(),
            timestamps,
            open,
            high,
            low,
            close,
            volume,
            BTreeMap::new(),
        )
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn timestamp_name(&self) -> &str {
        &self.timestamp_name
    }

    pub fn open(&self) -> &[f64] {
        &self.open
    }

    pub fn high(&self) -> &[f64] {
        &self.high
    }

    pub fn low(&self) -> &[f64] {
        &self.low
    }

    pub fn close(&self) -> &[f64] {
        &self.close
    }

    pub fn volume(&self) -> &[f64] {
        &self.volume
    }

    /// Look up a column by lower-cased name: the canonical five or any
    /// retained extra column.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        match name {
            "open" => Some(&self.open),
            "high" => Some(&self.high),
            "low" => Some(&self.low),
            "close" => Some(&self.close),
            "volume" => Some(&self.volume),
            _ => self.extras.get(name).map(|v| v.as_slice()),
        }
    }

    /// Names of retained non-canonical columns.
    pub fn extra_columns(&self) -> impl Iterator<Item = &str> {
        self.extras.keys().map(|k| k.as_str())
    }

    /// Materialise the bar at position `i`.
    pub fn bar(&self, i: usize) -> Bar {
        Bar {
            timestamp: self.timestamps[i],
            open: self.open[i],
            high: self.high[i],
            low: self.low[i],
            close: self.close[i],
            volume: self.volume[i],
        }
    }

    /// View of the prefix `[0..=i]` — what the strategy sees at bar `i`.
    pub fn view(&self, i: usize) -> DataView<'_> {
        debug_assert!(i < self.len());
        DataView {
            series: self,
            end: i + 1,
        }
    }

    /// Re-serialise the cleaned series: timestamp column under its original
    /// name, the canonical five in titled case, extras lower-cased.
    pub fn to_csv<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        let mut header = vec![
            self.timestamp_name.clone(),
            "Open".into(),
            "High".into(),
            "Low".into(),
            "Close".into(),
            "Volume".into(),
        ];
        header.extend(self.extras.keys().cloned());
        writeln!(out, "{}", header.join(","))?;

        for i in 0..self.len() {
            let mut row = vec![
                self.timestamps[i].to_rfc3339(),
                self.open[i].to_string(),
                self.high[i].to_string(),
                self.low[i].to_string(),
                self.close[i].to_string(),
                self.volume[i].to_string(),
            ];
            for col in self.extras.values() {
                row.push(col[i].to_string());
            }
            writeln!(out, "{}", row.join(","))?;
        }
        Ok(())
    }
}

/// Prefix view over a `BarSeries`: the bars visible to the strategy at a
/// given step. `[-1]` is the most recent visible bar.
#[derive(Debug, Clone, Copy)]
pub struct DataView<'a> {
    series: &'a BarSeries,
    end: usize,
}

impl<'a> DataView<'a> {
    pub fn len(&self) -> usize {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end == 0
    }

    pub fn open(&self) -> ColumnView<'a> {
        ColumnView {
            data: &self.series.open[..self.end],
        }
    }

    pub fn high(&self) -> ColumnView<'a> {
        ColumnView {
            data: &self.series.high[..self.end],
        }
    }

    pub fn low(&self) -> ColumnView<'a> {
        ColumnView {
            data: &self.series.low[..self.end],
        }
    }

    pub fn close(&self) -> ColumnView<'a> {
        ColumnView {
            data: &self.series.close[..self.end],
        }
    }

    pub fn volume(&self) -> ColumnView<'a> {
        ColumnView {
            data: &self.series.volume[..self.end],
        }
    }

    pub fn column(&self, name: &str) -> Option<ColumnView<'a>> {
        self.series
            .column(name)
            .map(|data| ColumnView {
                data: &data[..self.end],
            })
    }

    /// Timestamps of the visible prefix.
    pub fn index(&self) -> TimestampView<'a> {
        TimestampView {
            data: &self.series.timestamps[..self.end],
        }
    }
}

/// Numeric column restricted to the visible prefix.
///
/// Indexing follows the relative convention of the strategy surface:
/// negative offsets count back from the most recent visible bar
/// (`col[-1]` is "now"), non-negative offsets are absolute positions.
#[derive(Debug, Clone, Copy)]
pub struct ColumnView<'a> {
    data: &'a [f64],
}

impl<'a> ColumnView<'a> {
    pub(crate) fn new(data: &'a [f64]) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &'a [f64] {
        self.data
    }

    /// Non-panicking relative access.
    pub fn get(&self, offset: isize) -> Option<f64> {
        resolve(offset, self.data.len()).map(|i| self.data[i])
    }

    /// The most recent visible value, `self[-1]`.
    pub fn latest(&self) -> f64 {
        self.data[self.data.len() - 1]
    }
}

impl Index<isize> for ColumnView<'_> {
    type Output = f64;

    fn index(&self, offset: isize) -> &f64 {
        let i = resolve(offset, self.data.len())
            .unwrap_or_else(|| panic!("offset {offset} out of range for {} bars", self.data.len()));
        &self.data[i]
    }
}

/// Timestamp column restricted to the visible prefix, same indexing rules.
#[derive(Debug, Clone, Copy)]
pub struct TimestampView<'a> {
    data: &'a [DateTime<Utc>],
}

impl<'a> TimestampView<'a> {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &'a [DateTime<Utc>] {
        self.data
    }

    pub fn get(&self, offset: isize) -> Option<DateTime<Utc>> {
        resolve(offset, self.data.len()).map(|i| self.data[i])
    }
}

impl Index<isize> for TimestampView<'_> {
    type Output = DateTime<Utc>;

    fn index(&self, offset: isize) -> &DateTime<Utc> {
        let i = resolve(offset, self.data.len())
            .unwrap_or_else(|| panic!("offset {offset} out of range for {} bars", self.data.len()));
        &self.data[i]
    }
}

fn resolve(offset: isize, len: usize) -> Option<usize> {
    let i = if offset < 0 {
        len as isize + offset
    } else {
        offset
    };
    if i >= 0 && (i as usize) < len {
        Some(i as usize)
    } else {
        None
    }
}
