//! Simple Moving Average (SMA).
//!
//! Trailing mean of close prices over a fixed window.
//! Lookback: period - 1 (first defined value at index period-1).

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    /// A `period` of zero is treated as one.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        // Each window is summed from scratch so a NaN only poisons the windows
        // that contain it.
        (0..closes.len())
            .map(|i| {
                if i < self.lookback() {
                    return f64::NAN;
                }
                let window = &closes[i - self.lookback()..=i];
                window.iter().sum::<f64>() / self.period as f64
            })
            .collect()
    }
}
