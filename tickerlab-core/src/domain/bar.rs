//! Bar — one raw OHLCV observation as delivered by a quote provider.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Format used for the `date_str` column in storage and display.
///
/// Whole seconds only: sub-second parts of a timestamp are dropped when it is
/// rendered, so a stored row reloads at second precision.
pub const DATE_STR_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// OHLCV bar for a single instrument at a single point in time.
///
/// Bars carry no instrument id; the caller keeps them grouped per instrument
/// and in chronological order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Timestamp rendered with [`DATE_STR_FORMAT`].
    pub fn date_str(&self) -> String {
        self.timestamp.format(DATE_STR_FORMAT).to_string()
    }

    /// Returns true if any price or volume field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
            || self.volume.is_nan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_bar() -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            open: 100.0,
            high: 105.0,
            low: 98.0,
            close: 103.0,
            volume: 50_000.0,
        }
    }

    #[test]
    fn date_str_uses_storage_format() {
        assert_eq!(sample_bar().date_str(), "2024-01-02 09:00:00");
    }

    #[test]
    fn date_str_drops_sub_second_part() {
        let mut bar = sample_bar();
        bar.timestamp += chrono::Duration::milliseconds(750);
        assert_eq!(bar.date_str(), "2024-01-02 09:00:00");
    }

    #[test]
    fn detects_void_bar() {
        let mut bar = sample_bar();
        assert!(!bar.is_void());
        bar.volume = f64::NAN;
        assert!(bar.is_void());
    }
}
