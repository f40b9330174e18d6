//! Synthetic quote provider for offline runs.
//!
//! Produces a deterministic random walk per instrument (seeded from the
//! instrument id), so the same instrument always yields the same bars for a
//! given anchor time. Results are clearly fake; use them for demos and
//! pipeline checks only.

use super::provider::{FetchError, QuoteClient};
use crate::domain::{Bar, Interval, Ticker};
use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const BASE_ASSETS: [&str; 6] = ["BTC", "ETH", "XRP", "BAT", "PUNDIX", "USD1"];

/// Offline [`QuoteClient`] backed by a seeded random walk.
#[derive(Debug, Clone)]
pub struct SyntheticQuoteClient {
    /// Timestamp of the newest generated bar.
    anchor: NaiveDateTime,
}

impl SyntheticQuoteClient {
    pub fn new(anchor: NaiveDateTime) -> Self {
        Self { anchor }
    }

    /// Instruments must look like `QUOTE-BASE`; anything else is unknown.
    fn check_symbol(ticker: &str) -> Result<(), FetchError> {
        match ticker.split_once('-') {
            Some((quote, base)) if !quote.is_empty() && !base.is_empty() => Ok(()),
            _ => Err(FetchError::SymbolNotFound {
                symbol: ticker.to_string(),
            }),
        }
    }

    fn rng_for(ticker: &str) -> StdRng {
        let seed: [u8; 32] = *blake3::hash(ticker.as_bytes()).as_bytes();
        StdRng::from_seed(seed)
    }

    /// Random walk of `count` bars ending at the anchor.
    fn walk(&self, ticker: &str, interval: Interval, count: usize) -> Vec<Bar> {
        let mut rng = Self::rng_for(ticker);
        let mut price: f64 = rng.gen_range(100.0..10_000.0);
        let step = interval.step();

        (0..count)
            .map(|i| {
                let back = (count - 1 - i) as i32;
                let timestamp = self.anchor - step * back;
                let ret: f64 = rng.gen_range(-0.03..0.03);
                let open = price;
                let close = price * (1.0 + ret);
                let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
                let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
                let volume = rng.gen_range(1_000.0..100_000.0);
                price = close;
                Bar {
                    timestamp,
                    open,
                    high,
                    low,
                    close,
                    volume,
                }
            })
            .collect()
    }
}

impl QuoteClient for SyntheticQuoteClient {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn current_price(&self, ticker: &str) -> Result<f64, FetchError> {
        Self::check_symbol(ticker)?;
        self.walk(ticker, Interval::Day, 1)
            .last()
            .map(|b| b.close)
            .ok_or_else(|| FetchError::EmptyResponse {
                symbol: ticker.to_string(),
            })
    }

    fn bars(&self, ticker: &str, interval: Interval, count: usize) -> Result<Vec<Bar>, FetchError> {
        Self::check_symbol(ticker)?;
        if count == 0 {
            return Err(FetchError::EmptyResponse {
                symbol: ticker.to_string(),
            });
        }
        Ok(self.walk(ticker, interval, count))
    }

    fn instruments(&self, fiat: &str) -> Result<Vec<Ticker>, FetchError> {
        let fiat = fiat.to_ascii_uppercase();
        Ok(BASE_ASSETS
            .iter()
            .map(|base| format!("{fiat}-{base}"))
            .collect())
    }
}
