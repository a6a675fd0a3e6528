//! Dataset fingerprinting — deterministic identification of input data.

use crate::data::BarSeries;

/// Blake3 hex digest over the canonical columns and the timestamp index.
///
/// Two series with identical cleaned content hash identically regardless
/// of the raw CSV they came from, so results can be tied to data.
pub fn dataset_fingerprint(series: &BarSeries) -> String {
    let mut hasher = blake3::Hasher::new();
    for ts in series.timestamps() {
        hasher.update(&ts.timestamp().to_le_bytes());
    }
    for column in [
        series.open(),
        series.high(),
        series.low(),
        series.close(),
        series.volume(),
    ] {
        for value in column {
            hasher.update(&value.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic_walk;

    #[test]
    fn same_data_same_fingerprint() {
        let a = synthetic_walk(50, 3);
        let b = synthetic_walk(50, 3);
        assert_eq!(dataset_fingerprint(&a), dataset_fingerprint(&b));
    }

    #[test]
    fn different_data_different_fingerprint() {
        let a = synthetic_walk(50, 3);
        let b = synthetic_walk(50, 4);
        assert_ne!(dataset_fingerprint(&a), dataset_fingerprint(&b));
    }
}
