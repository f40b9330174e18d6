//! Tracing subscriber setup for the binary.

use anyhow::{bail, Result};
use tracing_subscriber::EnvFilter;

/// Environment variable that overrides `--log-level` with a full filter
/// directive (e.g. `tickerlab_runner=debug,info`).
pub const LOG_ENV: &str = "TICKERLAB_LOG";

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays clean.
pub fn init_tracing(log_level: &str, log_format: &str) -> Result<()> {
    let filter = std::env::var(LOG_ENV).unwrap_or_else(|_| log_level.to_string());
    let env_filter = EnvFilter::try_new(&filter)
        .map_err(|err| anyhow::anyhow!("invalid log filter '{filter}': {err}"))?;

    match log_format.trim().to_lowercase().as_str() {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .init(),
        "text" | "" => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init(),
        other => bail!("unknown log format '{other}' (expected text or json)"),
    }
    Ok(())
}
