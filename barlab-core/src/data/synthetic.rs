//! Seeded synthetic bar generator for tests and benches.

use super::series::BarSeries;
use crate::domain::Bar;
use chrono::{TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generate `n` fifteen-minute bars as a seeded random walk starting at 100.
///
/// OHLC relationships are kept consistent (high above both open and close,
/// low below both), so the output always passes `Bar::is_sane`.
pub fn synthetic_walk(n: usize, seed: u64) -> BarSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let mut bars = Vec::with_capacity(n);
    let mut price = 100.0_f64;

    for i in 0..n {
        let open = price;
        let drift: f64 = rng.gen_range(-1.5..1.5);
        let close = (open + drift).max(1.0);
        let wick_up: f64 = rng.gen_range(0.0..1.0);
        let wick_down: f64 = rng.gen_range(0.0..1.0);

        bars.push(Bar {
            timestamp: start + chrono::Duration::minutes(15 * i as i64),
            open,
            high: open.max(close) + wick_up,
            low: (open.min(close) - wick_down).max(0.5),
            close,
            volume: rng.gen_range(100.0..10_000.0),
        });
        price = close;
    }

    BarSeries::from_bars(bars).expect("synthetic walk produces ordered non-empty bars")
}
