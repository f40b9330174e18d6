//! Collection orchestrator: instruments in, one unified table out.
//!
//! For each instrument, in list order, the collector fetches the current
//! price, fetches the requested bars, derives features and appends the rows.
//! A failing instrument is logged and skipped; the batch only fails when the
//! list is empty or nothing succeeded.

use crate::pacing::{Pacer, ThreadSleepPacer};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tickerlab_core::data::{FetchError, QuoteClient};
use tickerlab_core::domain::{Interval, Ticker, UnifiedTable};
use tickerlab_core::features::FeatureDeriver;

/// Instruments used when neither the command line nor a config names any.
pub const DEFAULT_INSTRUMENTS: [&str; 3] = ["KRW-PUNDIX", "KRW-USD1", "KRW-BAT"];

/// Default number of bars per instrument.
pub const DEFAULT_BAR_COUNT: usize = 30;

/// Default pause between instruments.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(100);

/// Batch-level failures. Per-instrument failures never surface here.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("no instruments to collect")]
    NoInstruments,

    #[error("every instrument failed ({attempted} attempted)")]
    AllFailed {
        attempted: usize,
        errors: Vec<(Ticker, FetchError)>,
    },
}

/// Parameters for one collection batch.
#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub bar_count: usize,
    pub interval: Interval,
    pub delay: Duration,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            bar_count: DEFAULT_BAR_COUNT,
            interval: Interval::Day,
            delay: DEFAULT_DELAY,
        }
    }
}

/// Numbers instrument attempts within one batch, starting at 1.
#[derive(Debug, Default)]
pub struct BatchSequence {
    next: u64,
}

impl BatchSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_attempt(&mut self) -> u64 {
        self.next += 1;
        self.next
    }

    /// Attempts handed out so far.
    pub fn issued(&self) -> u64 {
        self.next
    }
}

/// What happened to one instrument.
#[derive(Debug)]
pub struct InstrumentOutcome {
    pub ticker: Ticker,
    pub attempt: u64,
    /// Rows appended to the table; `Err` if the bar fetch failed.
    pub rows: Result<usize, FetchError>,
}

impl InstrumentOutcome {
    pub fn succeeded(&self) -> bool {
        self.rows.is_ok()
    }
}

/// Result of a successful batch.
#[derive(Debug)]
pub struct Collection {
    pub table: UnifiedTable,
    /// Current price per requested instrument; `None` where the lookup failed.
    pub prices: BTreeMap<Ticker, Option<f64>>,
    pub outcomes: Vec<InstrumentOutcome>,
}

impl Collection {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}

/// Progress callbacks for a collection batch.
pub trait CollectProgress: Send {
    /// Called when starting an instrument.
    fn on_start(&self, ticker: &str, index: usize, total: usize);

    /// Called when an instrument is done.
    fn on_complete(
        &self,
        ticker: &str,
        index: usize,
        total: usize,
        result: &Result<usize, FetchError>,
    );

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Reports progress as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl CollectProgress for TracingProgress {
    fn on_start(&self, ticker: &str, index: usize, total: usize) {
        tracing::info!(instrument = %ticker, "[{}/{}] collecting", index + 1, total);
    }

    fn on_complete(
        &self,
        ticker: &str,
        _index: usize,
        _total: usize,
        result: &Result<usize, FetchError>,
    ) {
        match result {
            Ok(rows) => tracing::info!(instrument = %ticker, rows, "collected"),
            Err(e) => tracing::error!(instrument = %ticker, error = %e, "skipping instrument"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        tracing::info!(succeeded, failed, total, "collection batch complete");
    }
}

/// Drives a [`QuoteClient`] over a list of instruments.
pub struct Collector<'a> {
    client: &'a dyn QuoteClient,
    pacer: Box<dyn Pacer + 'a>,
    deriver: FeatureDeriver,
}

impl<'a> Collector<'a> {
    /// A collector that sleeps the real delay between instruments.
    pub fn new(client: &'a dyn QuoteClient) -> Self {
        Self::with_pacer(client, ThreadSleepPacer)
    }

    pub fn with_pacer(client: &'a dyn QuoteClient, pacer: impl Pacer + 'a) -> Self {
        Self {
            client,
            pacer: Box::new(pacer),
            deriver: FeatureDeriver::new(),
        }
    }

    /// Collect every instrument in `tickers`, in order.
    pub fn collect(
        &self,
        tickers: &[&str],
        opts: &CollectOptions,
        progress: &dyn CollectProgress,
    ) -> Result<Collection, CollectError> {
        if tickers.is_empty() {
            return Err(CollectError::NoInstruments);
        }

        let total = tickers.len();
        let mut sequence = BatchSequence::new();
        let mut table = UnifiedTable::new();
        let mut prices = BTreeMap::new();
        let mut outcomes = Vec::with_capacity(total);

        tracing::debug!(
            provider = self.client.name(),
            instruments = total,
            bar_count = opts.bar_count,
            interval = %opts.interval,
            "starting collection"
        );

        for (i, &ticker) in tickers.iter().enumerate() {
            if i > 0 {
                self.pacer.pause(opts.delay);
            }
            let attempt = sequence.next_attempt();
            progress.on_start(ticker, i, total);

            let price = match self.client.current_price(ticker) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::error!(
                        instrument = %ticker,
                        attempt,
                        error = %e,
                        "current price unavailable"
                    );
                    None
                }
            };
            prices.insert(ticker.to_string(), price);

            let rows = self
                .client
                .bars(ticker, opts.interval, opts.bar_count)
                .and_then(|bars| {
                    if bars.is_empty() {
                        return Err(FetchError::EmptyResponse {
                            symbol: ticker.to_string(),
                        });
                    }
                    let void = bars.iter().filter(|b| b.is_void()).count();
                    if void > 0 {
                        tracing::warn!(instrument = %ticker, void, "bars with missing values");
                    }
                    let enriched = self.deriver.derive(ticker, &bars);
                    let n = enriched.len();
                    table.append(enriched);
                    Ok(n)
                });
            progress.on_complete(ticker, i, total, &rows);

            outcomes.push(InstrumentOutcome {
                ticker: ticker.to_string(),
                attempt,
                rows,
            });
        }

        let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
        progress.on_batch_complete(succeeded, total - succeeded, total);

        if succeeded == 0 {
            let errors = outcomes
                .into_iter()
                .filter_map(|o| o.rows.err().map(|e| (o.ticker, e)))
                .collect();
            return Err(CollectError::AllFailed {
                attempted: sequence.issued() as usize,
                errors,
            });
        }

        Ok(Collection {
            table,
            prices,
            outcomes,
        })
    }
}
