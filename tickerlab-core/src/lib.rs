//! TickerLab Core — bar types, feature derivation, quote providers.
//!
//! This crate holds everything that does not touch disk:
//! - Domain types (bars, enriched rows, the unified table, intervals)
//! - Quote clients (Upbit REST, deterministic synthetic walk)
//! - Per-instrument feature derivation (`price_change`, `ma5`, ...)
//! - Polars conversion and schema validation for downstream consumers

pub mod data;
pub mod domain;
pub mod features;
pub mod indicators;
pub mod schema;

pub use data::{FetchError, QuoteClient, SyntheticQuoteClient, UpbitClient};
pub use domain::{Bar, BarColumn, EnrichedBar, Interval, Ticker, UnifiedTable};
pub use features::FeatureDeriver;
