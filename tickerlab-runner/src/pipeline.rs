//! Pipeline runner — wires together collection, persistence and reload.
//!
//! `run_pipeline()` is the entry point used by the CLI `collect` command:
//! collect every instrument, replace the relation, then read it back newest
//! first for the reporter.

use std::collections::BTreeMap;

use thiserror::Error;
use tickerlab_core::data::QuoteClient;
use tickerlab_core::domain::{Ticker, UnifiedTable};

use crate::collector::{CollectError, CollectOptions, CollectProgress, Collector, InstrumentOutcome};
use crate::pacing::Pacer;
use crate::store::{Filter, OrderBy, SqliteStore, StoreError};

/// Errors from the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("collection failed: {0}")]
    Collect(#[from] CollectError),
    #[error("store failed: {0}")]
    Store(#[from] StoreError),
}

/// Everything one pipeline run produced.
#[derive(Debug)]
pub struct PipelineResult {
    pub relation: String,
    pub prices: BTreeMap<Ticker, Option<f64>>,
    pub outcomes: Vec<InstrumentOutcome>,
    /// Row count read back from the relation after the replace.
    pub persisted: usize,
    /// The relation as reloaded, newest first.
    pub reloaded: UnifiedTable,
}

impl PipelineResult {
    pub fn failed_instruments(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.succeeded())
            .map(|o| o.ticker.as_str())
            .collect()
    }
}

/// Collect `tickers`, persist under `relation` and reload it.
pub fn run_pipeline(
    client: &dyn QuoteClient,
    pacer: impl Pacer + 'static,
    store: &mut SqliteStore,
    relation: &str,
    tickers: &[&str],
    opts: &CollectOptions,
    progress: &dyn CollectProgress,
) -> Result<PipelineResult, PipelineError> {
    let collection = Collector::with_pacer(client, pacer).collect(tickers, opts, progress)?;

    let persisted = store.persist(relation, &collection.table)?;
    if persisted != collection.table.len() {
        tracing::warn!(
            relation,
            expected = collection.table.len(),
            persisted,
            "row count read back differs from rows written"
        );
    }

    let reloaded = store.load(relation, &Filter::all(), &OrderBy::newest_first())?;

    Ok(PipelineResult {
        relation: relation.to_string(),
        prices: collection.prices,
        outcomes: collection.outcomes,
        persisted,
        reloaded,
    })
}
