//! CSV export of a unified table.
//!
//! Columns follow the fixed enriched order; NaN is written as an empty field.

use std::path::Path;

use anyhow::{Context, Result};
use tickerlab_core::domain::{UnifiedTable, ENRICHED_COLUMNS};

/// Render `table` as CSV with a header row.
pub fn export_csv(table: &UnifiedTable) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    write_rows(&mut wtr, table)?;
    let bytes = wtr.into_inner().context("failed to flush CSV buffer")?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

/// Write `table` as CSV to `path`, replacing any existing file.
pub fn write_csv(table: &UnifiedTable, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    write_rows(&mut wtr, table)?;
    wtr.flush()
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), rows = table.len(), "wrote CSV");
    Ok(())
}

fn write_rows<W: std::io::Write>(wtr: &mut csv::Writer<W>, table: &UnifiedTable) -> Result<()> {
    wtr.write_record(ENRICHED_COLUMNS)
        .context("failed to write CSV header")?;
    for row in table {
        wtr.write_record(row.to_record())
            .with_context(|| format!("failed to write CSV row for {}", row.ticker))?;
    }
    Ok(())
}
