//! Domain types for tickerlab

pub mod bar;
pub mod enriched;
pub mod interval;
pub mod table;

pub use bar::{Bar, DATE_STR_FORMAT};
pub use enriched::{BarColumn, EnrichedBar, ENRICHED_COLUMNS};
pub use interval::{Interval, IntervalParseError};
pub use table::UnifiedTable;

/// Instrument identifier, e.g. `KRW-BTC`.
pub type Ticker = String;
