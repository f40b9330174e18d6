//! Candle interval supported by the quote providers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Minute1,
    Minute3,
    Minute5,
    Minute10,
    Minute15,
    Minute30,
    Minute60,
    Minute240,
    #[default]
    Day,
    Week,
    Month,
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown interval '{0}' (expected minute1/3/5/10/15/30/60/240, day, week or month)")]
pub struct IntervalParseError(pub String);

impl Interval {
    pub fn as_str(self) -> &'static str {
        match self {
            Interval::Minute1 => "minute1",
            Interval::Minute3 => "minute3",
            Interval::Minute5 => "minute5",
            Interval::Minute10 => "minute10",
            Interval::Minute15 => "minute15",
            Interval::Minute30 => "minute30",
            Interval::Minute60 => "minute60",
            Interval::Minute240 => "minute240",
            Interval::Day => "day",
            Interval::Week => "week",
            Interval::Month => "month",
        }
    }

    /// Minute unit for intraday intervals, `None` for day and above.
    pub fn minutes(self) -> Option<u32> {
        match self {
            Interval::Minute1 => Some(1),
            Interval::Minute3 => Some(3),
            Interval::Minute5 => Some(5),
            Interval::Minute10 => Some(10),
            Interval::Minute15 => Some(15),
            Interval::Minute30 => Some(30),
            Interval::Minute60 => Some(60),
            Interval::Minute240 => Some(240),
            Interval::Day | Interval::Week | Interval::Month => None,
        }
    }

    /// Nominal bar spacing. Months are treated as 30 days.
    pub fn step(self) -> chrono::Duration {
        match self {
            Interval::Day => chrono::Duration::days(1),
            Interval::Week => chrono::Duration::weeks(1),
            Interval::Month => chrono::Duration::days(30),
            intraday => chrono::Duration::minutes(i64::from(intraday.minutes().unwrap_or(1))),
        }
    }
}

impl FromStr for Interval {
    type Err = IntervalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let interval = match normalized.as_str() {
            "minute1" | "minutes1" | "1m" => Interval::Minute1,
            "minute3" | "minutes3" | "3m" => Interval::Minute3,
            "minute5" | "minutes5" | "5m" => Interval::Minute5,
            "minute10" | "minutes10" | "10m" => Interval::Minute10,
            "minute15" | "minutes15" | "15m" => Interval::Minute15,
            "minute30" | "minutes30" | "30m" => Interval::Minute30,
            "minute60" | "minutes60" | "60m" | "1h" => Interval::Minute60,
            "minute240" | "minutes240" | "240m" | "4h" => Interval::Minute240,
            "day" | "days" | "1d" => Interval::Day,
            "week" | "weeks" | "1w" => Interval::Week,
            "month" | "months" => Interval::Month,
            _ => return Err(IntervalParseError(s.to_string())),
        };
        Ok(interval)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
