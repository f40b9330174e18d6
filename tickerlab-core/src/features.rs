//! Feature derivation: raw bars of one instrument → enriched rows.
//!
//! Per-row features (`price_change`, `price_change_pct`, `high_low_diff`) are
//! pure functions of a single bar. `ma5` is a trailing 5-bar SMA of close,
//! computed over this instrument only. Where the average is undefined (the
//! first four bars, or a window containing NaN) the row's own close is used.

use crate::domain::{Bar, EnrichedBar, ENRICHED_COLUMNS};
use crate::indicators::{Indicator, Sma};

/// Window of the `ma5` column.
pub const MA_WINDOW: usize = 5;

/// `close - open`.
pub fn price_change(bar: &Bar) -> f64 {
    bar.close - bar.open
}

/// `change / open * 100`, NaN when `open` is zero.
pub fn price_change_pct(change: f64, open: f64) -> f64 {
    if open == 0.0 {
        return f64::NAN;
    }
    change / open * 100.0
}

/// `high - low`.
pub fn high_low_diff(bar: &Bar) -> f64 {
    bar.high - bar.low
}

/// Turns one instrument's chronological bars into [`EnrichedBar`]s.
#[derive(Debug, Clone)]
pub struct FeatureDeriver {
    ma: Sma,
}

impl FeatureDeriver {
    pub fn new() -> Self {
        Self {
            ma: Sma::new(MA_WINDOW),
        }
    }

    /// Derive features for `bars`, which must already be in chronological
    /// order for `ticker`. An empty input yields an empty output.
    pub fn derive(&self, ticker: &str, bars: &[Bar]) -> Vec<EnrichedBar> {
        if bars.is_empty() {
            tracing::debug!(instrument = %ticker, "no bars to derive");
            return Vec::new();
        }

        let ma = self.ma.compute(bars);
        let rows: Vec<EnrichedBar> = bars
            .iter()
            .zip(ma)
            .map(|(bar, avg)| {
                let change = price_change(bar);
                EnrichedBar {
                    timestamp: bar.timestamp,
                    ticker: ticker.to_string(),
                    open: bar.open,
                    high: bar.high,
                    low: bar.low,
                    close: bar.close,
                    volume: bar.volume,
                    price_change: change,
                    price_change_pct: price_change_pct(change, bar.open),
                    high_low_diff: high_low_diff(bar),
                    ma5: if avg.is_nan() { bar.close } else { avg },
                }
            })
            .collect();

        tracing::debug!(
            instrument = %ticker,
            rows_in = bars.len(),
            columns = ENRICHED_COLUMNS.len(),
            indicator = self.ma.name(),
            "derived price_change, price_change_pct, high_low_diff, ma5"
        );
        rows
    }
}

impl Default for FeatureDeriver {
    fn default() -> Self {
        Self::new()
    }
}
