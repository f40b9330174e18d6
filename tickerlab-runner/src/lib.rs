//! TickerLab Runner — collection orchestration, relation store, reporting.
//!
//! This crate builds on `tickerlab-core` to provide:
//! - The collector (per-instrument fetch, derive, append, with pacing)
//! - The SQLite relation store with structured reload queries
//! - TOML collection config
//! - Reporter data preparation and CSV export
//! - The end-to-end pipeline used by the CLI

pub mod collector;
pub mod config;
pub mod export;
pub mod pacing;
pub mod pipeline;
pub mod report;
pub mod store;

pub use collector::{
    BatchSequence, Collection, CollectError, CollectOptions, CollectProgress, Collector,
    InstrumentOutcome, TracingProgress, DEFAULT_BAR_COUNT, DEFAULT_DELAY, DEFAULT_INSTRUMENTS,
};
pub use config::{CollectConfig, ConfigError, StoreConfig};
pub use export::{export_csv, write_csv};
pub use pacing::{NoPacer, Pacer, ThreadSleepPacer};
pub use pipeline::{run_pipeline, PipelineError, PipelineResult};
pub use report::{chart_series, render_table, ChartSeries};
pub use store::{
    Condition, Filter, OrderBy, QueryParseError, RelationInfo, SqliteStore, StoreError,
    DEFAULT_DB_PATH, DEFAULT_RELATION,
};
