//! Quote client trait and structured fetch errors.
//!
//! The QuoteClient trait abstracts over quote sources (Upbit, synthetic) so
//! the collector can be driven by a mock in tests.

use crate::domain::{Bar, Interval, Ticker};
use std::collections::BTreeMap;
use thiserror::Error;

/// A failed call to a quote provider.
///
/// Displayable in both CLI output and log lines.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("empty response for '{symbol}'")]
    EmptyResponse { symbol: String },

    #[error("fetch error: {0}")]
    Other(String),
}

/// Source of spot prices and historical bars.
///
/// Implementations return bars in chronological order and validate required
/// fields before handing bars out.
pub trait QuoteClient: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Latest traded price for one instrument.
    fn current_price(&self, ticker: &str) -> Result<f64, FetchError>;

    /// Latest traded price for several instruments.
    ///
    /// The default makes one call per instrument and fails on the first error.
    fn current_prices(&self, tickers: &[&str]) -> Result<BTreeMap<Ticker, f64>, FetchError> {
        tickers
            .iter()
            .map(|t| Ok((t.to_string(), self.current_price(t)?)))
            .collect()
    }

    /// The most recent `count` bars for `ticker`, oldest first.
    fn bars(&self, ticker: &str, interval: Interval, count: usize) -> Result<Vec<Bar>, FetchError>;

    /// Tradable instruments quoted in `fiat` (e.g. "KRW").
    fn instruments(&self, fiat: &str) -> Result<Vec<Ticker>, FetchError>;
}
