//! EnrichedBar and the fixed column contract shared by storage, export and display.

use super::bar::DATE_STR_FORMAT;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column names in storage order. Changing this order breaks existing databases.
pub const ENRICHED_COLUMNS: [&str; 11] = [
    "date_str",
    "ticker",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "price_change",
    "price_change_pct",
    "high_low_diff",
    "ma5",
];

/// A bar with its derived features, tagged with the instrument it belongs to.
///
/// `price_change_pct` is NaN when `open` is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedBar {
    pub timestamp: NaiveDateTime,
    pub ticker: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub price_change: f64,
    pub price_change_pct: f64,
    pub high_low_diff: f64,
    pub ma5: f64,
}

impl EnrichedBar {
    pub fn date_str(&self) -> String {
        self.timestamp.format(DATE_STR_FORMAT).to_string()
    }

    /// Numeric value of a column, `None` for the two text columns.
    pub fn numeric(&self, column: BarColumn) -> Option<f64> {
        match column {
            BarColumn::DateStr | BarColumn::Ticker => None,
            BarColumn::Open => Some(self.open),
            BarColumn::High => Some(self.high),
            BarColumn::Low => Some(self.low),
            BarColumn::Close => Some(self.close),
            BarColumn::Volume => Some(self.volume),
            BarColumn::PriceChange => Some(self.price_change),
            BarColumn::PriceChangePct => Some(self.price_change_pct),
            BarColumn::HighLowDiff => Some(self.high_low_diff),
            BarColumn::Ma5 => Some(self.ma5),
        }
    }

    /// All eleven values rendered as text, in [`ENRICHED_COLUMNS`] order.
    ///
    /// NaN renders as an empty field.
    pub fn to_record(&self) -> Vec<String> {
        BarColumn::ALL
            .iter()
            .map(|&column| match column {
                BarColumn::DateStr => self.date_str(),
                BarColumn::Ticker => self.ticker.clone(),
                numeric => match self.numeric(numeric) {
                    Some(v) if v.is_nan() => String::new(),
                    Some(v) => v.to_string(),
                    None => String::new(),
                },
            })
            .collect()
    }
}

/// Closed set of columns a filter or ordering may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarColumn {
    DateStr,
    Ticker,
    Open,
    High,
    Low,
    Close,
    Volume,
    PriceChange,
    PriceChangePct,
    HighLowDiff,
    Ma5,
}

impl BarColumn {
    /// Every column, in storage order.
    pub const ALL: [BarColumn; 11] = [
        BarColumn::DateStr,
        BarColumn::Ticker,
        BarColumn::Open,
        BarColumn::High,
        BarColumn::Low,
        BarColumn::Close,
        BarColumn::Volume,
        BarColumn::PriceChange,
        BarColumn::PriceChangePct,
        BarColumn::HighLowDiff,
        BarColumn::Ma5,
    ];

    pub fn name(self) -> &'static str {
        ENRICHED_COLUMNS[self.position()]
    }

    /// Zero-based position in the storage order.
    pub fn position(self) -> usize {
        match self {
            BarColumn::DateStr => 0,
            BarColumn::Ticker => 1,
            BarColumn::Open => 2,
            BarColumn::High => 3,
            BarColumn::Low => 4,
            BarColumn::Close => 5,
            BarColumn::Volume => 6,
            BarColumn::PriceChange => 7,
            BarColumn::PriceChangePct => 8,
            BarColumn::HighLowDiff => 9,
            BarColumn::Ma5 => 10,
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, BarColumn::DateStr | BarColumn::Ticker)
    }

    /// Case-insensitive lookup by column name.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for BarColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
