//! CSV ingest: header cleaning, timestamp parsing, sorting.

use super::series::BarSeries;
use super::DataError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::io::Read;

const CANONICAL: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// Load a bar series from CSV.
///
/// Header names are trimmed and lower-cased; any column whose name contains
/// "unnamed" is discarded (pandas index exports). The canonical five OHLCV
/// columns plus `timestamp_column` are required; every other surviving
/// column is retained as an extra numeric series. Rows are stably sorted by
/// timestamp, so duplicates keep their input order.
pub fn load_csv<R: Read>(reader: R, timestamp_column: &str) -> Result<BarSeries, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let ts_name = timestamp_column.trim().to_lowercase();

    // Map surviving columns: (input position, cleaned name).
    let headers = rdr.headers()?.clone();
    let mut kept: Vec<(usize, String)> = Vec::new();
    for (pos, raw) in headers.iter().enumerate() {
        let name = raw.trim().to_lowercase();
        if name.contains("unnamed") {
            continue;
        }
        kept.push((pos, name));
    }

    let ts_pos = kept
        .iter()
        .find(|(_, name)| *name == ts_name)
        .map(|(pos, _)| *pos)
        .ok_or_else(|| DataError::MissingColumn(ts_name.clone()))?;

    for required in CANONICAL {
        if !kept.iter().any(|(_, name)| name == required) {
            return Err(DataError::MissingColumn(required.to_string()));
        }
    }

    // Parse rows into (timestamp, values-per-kept-column).
    let numeric: Vec<(usize, String)> = kept
        .iter()
        .filter(|(pos, _)| *pos != ts_pos)
        .cloned()
        .collect();

    let mut timestamps: Vec<DateTime<Utc>> = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); numeric.len()];

    for (row_idx, record) in rdr.records().enumerate() {
        let record = record?;
        let raw_ts = record.get(ts_pos).unwrap_or("");
        let ts = parse_timestamp(raw_ts).ok_or_else(|| DataError::BadTimestamp {
            row: row_idx,
            value: raw_ts.to_string(),
        })?;
        timestamps.push(ts);

        for (col_idx, (pos, name)) in numeric.iter().enumerate() {
            let raw = record.get(*pos).unwrap_or("");
            let value = parse_number(raw).ok_or_else(|| DataError::NonNumeric {
                column: name.clone(),
                row: row_idx,
                value: raw.to_string(),
            })?;
            columns[col_idx].push(value);
        }
    }

    if timestamps.is_empty() {
        return Err(DataError::Empty);
    }

    // Stable sort by timestamp via a permutation of row indices.
    let mut order: Vec<usize> = (0..timestamps.len()).collect();
    order.sort_by_key(|&i| timestamps[i]);

    let timestamps: Vec<DateTime<Utc>> = order.iter().map(|&i| timestamps[i]).collect();
    let columns: Vec<Vec<f64>> = columns
        .into_iter()
        .map(|col| order.iter().map(|&i| col[i]).collect())
        .collect();

    let mut canonical: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    let mut extras: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for ((_, name), col) in numeric.into_iter().zip(columns) {
        if let Some(&canon) = CANONICAL.iter().find(|c| **c == name) {
            canonical.insert(canon, col);
        } else {
            extras.insert(name, col);
        }
    }

    let mut take = |name: &str| {
        canonical
            .remove(name)
            .expect("canonical column presence verified above")
    };
    let (open, high, low, close, volume) = (
        take("open"),
        take("high"),
        take("low"),
        take("close"),
        take("volume"),
    );

    BarSeries::from_columns(ts_name, timestamps, open, high, low, close, volume, extras)
}

/// Parse a timestamp cell to UTC.
///
/// Accepted forms: RFC 3339, `%Y-%m-%d %H:%M:%S`, `%Y-%m-%dT%H:%M:%S`,
/// bare dates, and integer epoch seconds (milliseconds when > 1e12).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    if let Ok(epoch) = raw.parse::<i64>() {
        let ts = if epoch.abs() > 1_000_000_000_000 {
            DateTime::from_timestamp_millis(epoch)
        } else {
            DateTime::from_timestamp(epoch, 0)
        };
        return ts;
    }
    None
}

fn parse_number(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        // Empty cells surface as NaN rather than load failure; the engine
        // treats the bar as anomalous.
        return Some(f64::NAN);
    }
    raw.parse::<f64>().ok()
}
