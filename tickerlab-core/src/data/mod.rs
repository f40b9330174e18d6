//! Quote providers

pub mod provider;
pub mod synthetic;
pub mod upbit;

pub use provider::{FetchError, QuoteClient};
pub use synthetic::SyntheticQuoteClient;
pub use upbit::UpbitClient;
