//! Property tests for feature derivation.
//!
//! Uses proptest to verify:
//! 1. Per-row deltas are exact (`price_change`, `high_low_diff`)
//! 2. `price_change_pct` is NaN exactly when open is zero
//! 3. `ma5` falls back to close for the first four rows and is a trailing
//!    5-bar mean afterwards
//! 4. Derivation preserves row count, order and instrument id

use proptest::prelude::*;
use tickerlab_core::domain::{Bar, ENRICHED_COLUMNS};
use tickerlab_core::features::FeatureDeriver;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_bar_values() -> impl Strategy<Value = (f64, f64, f64, f64, f64)> {
    (
        0.0..10_000.0_f64,
        0.0..10_000.0_f64,
        0.0..500.0_f64,
        0.0..500.0_f64,
        0.0..1e6_f64,
    )
        .prop_map(|(open, close, up, down, volume)| {
            let high = open.max(close) + up;
            let low = open.min(close) - down;
            (open, high, low, close, volume)
        })
}

fn arb_bars() -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec(arb_bar_values(), 0..60).prop_map(|values| {
        let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        values
            .into_iter()
            .enumerate()
            .map(|(i, (open, high, low, close, volume))| Bar {
                timestamp: base + chrono::Duration::days(i as i64),
                open,
                high,
                low,
                close,
                volume,
            })
            .collect()
    })
}

fn close_enough(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

// ── Properties ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn deltas_are_exact(bars in arb_bars()) {
        let rows = FeatureDeriver::new().derive("KRW-BTC", &bars);
        for (row, bar) in rows.iter().zip(&bars) {
            prop_assert_eq!(row.price_change, bar.close - bar.open);
            prop_assert_eq!(row.high_low_diff, bar.high - bar.low);
        }
    }

    #[test]
    fn pct_is_nan_only_for_zero_open(bars in arb_bars()) {
        let rows = FeatureDeriver::new().derive("KRW-BTC", &bars);
        for row in &rows {
            if row.open == 0.0 {
                prop_assert!(row.price_change_pct.is_nan());
            } else {
                prop_assert!(close_enough(
                    row.price_change_pct,
                    row.price_change / row.open * 100.0
                ));
            }
        }
    }

    #[test]
    fn ma5_is_trailing_mean_with_close_fallback(bars in arb_bars()) {
        let rows = FeatureDeriver::new().derive("KRW-BTC", &bars);
        for (i, row) in rows.iter().enumerate() {
            if i < 4 {
                prop_assert_eq!(row.ma5, bars[i].close);
            } else {
                let mean = bars[i - 4..=i].iter().map(|b| b.close).sum::<f64>() / 5.0;
                prop_assert!(close_enough(row.ma5, mean), "row {}: {} vs {}", i, row.ma5, mean);
            }
        }
    }

    #[test]
    fn rows_keep_order_and_instrument(bars in arb_bars()) {
        let rows = FeatureDeriver::new().derive("KRW-ETH", &bars);
        prop_assert_eq!(rows.len(), bars.len());
        for (row, bar) in rows.iter().zip(&bars) {
            prop_assert_eq!(row.timestamp, bar.timestamp);
            prop_assert_eq!(row.ticker.as_str(), "KRW-ETH");
            prop_assert_eq!(row.close, bar.close);
            prop_assert_eq!(row.volume, bar.volume);
        }
    }
}

#[test]
fn record_follows_column_order() {
    let bars = vec![Bar {
        timestamp: chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap(),
        open: 10.0,
        high: 12.0,
        low: 9.0,
        close: 11.0,
        volume: 3.0,
    }];
    let rows = FeatureDeriver::new().derive("KRW-BAT", &bars);
    let record = rows[0].to_record();

    assert_eq!(record.len(), ENRICHED_COLUMNS.len());
    assert_eq!(record[0], "2024-03-01 00:00:00");
    assert_eq!(record[1], "KRW-BAT");
    assert_eq!(record[2], "10");
    assert_eq!(record[7], "1");
    assert_eq!(record[8], "10");
    assert_eq!(record[10], "11");
}
