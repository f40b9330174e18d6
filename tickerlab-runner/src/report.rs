//! Reporter data preparation: chart series and per-instrument text tables.

use std::fmt::Write;
use tickerlab_core::domain::{EnrichedBar, Ticker, UnifiedTable, ENRICHED_COLUMNS};

/// Axis label format for chart series.
pub const LABEL_FORMAT: &str = "%m-%d";

const CELL_WIDTH: usize = 13;

/// Close and `ma5` lines for one instrument, chronological.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub ticker: Ticker,
    pub labels: Vec<String>,
    pub close: Vec<f64>,
    pub ma5: Vec<f64>,
}

impl ChartSeries {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// One series per instrument, in first-seen order, each sorted by timestamp.
///
/// Works on any row order, so a newest-first reload can be charted as is.
pub fn chart_series(table: &UnifiedTable) -> Vec<ChartSeries> {
    table
        .instruments()
        .into_iter()
        .map(|ticker| {
            let mut rows: Vec<&EnrichedBar> = table.rows_for(ticker).collect();
            rows.sort_by_key(|r| r.timestamp);
            ChartSeries {
                ticker: ticker.to_string(),
                labels: rows
                    .iter()
                    .map(|r| r.timestamp.format(LABEL_FORMAT).to_string())
                    .collect(),
                close: rows.iter().map(|r| r.close).collect(),
                ma5: rows.iter().map(|r| r.ma5).collect(),
            }
        })
        .collect()
}

/// Text table per instrument, at most `head` rows each, in table order.
pub fn render_table(table: &UnifiedTable, head: usize) -> String {
    let rule = "=".repeat(ENRICHED_COLUMNS.len() * CELL_WIDTH);
    let mut out = String::new();

    for ticker in table.instruments() {
        let _ = writeln!(out, "{rule}");
        let header: Vec<String> = ENRICHED_COLUMNS
            .iter()
            .enumerate()
            .map(|(i, c)| cell(c, i))
            .collect();
        let _ = writeln!(out, "{}", header.join("").trim_end());

        for row in table.rows_for(ticker).take(head) {
            let line: Vec<String> = row
                .to_record()
                .iter()
                .enumerate()
                .map(|(i, v)| cell(if v.is_empty() { "NaN" } else { v.as_str() }, i))
                .collect();
            let _ = writeln!(out, "{}", line.join("").trim_end());
        }
    }
    let _ = writeln!(out, "{rule}");
    out
}

/// Text columns are left-aligned, numbers right-aligned. The date column is
/// wider than a cell and is never cut.
fn cell(value: &str, column: usize) -> String {
    match column {
        0 => format!("{value:<21}"),
        1 => format!("{value:<13}"),
        _ => {
            let value = shorten_number(value);
            format!("{value:>width$}", width = CELL_WIDTH)
        }
    }
}

/// Up to six decimal places; long fractions are cut to fit a cell.
fn shorten_number(value: &str) -> String {
    match value.parse::<f64>() {
        Ok(n) if value.len() > CELL_WIDTH - 1 => {
            let s = format!("{n:.6}");
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        }
        _ => value.to_string(),
    }
}
