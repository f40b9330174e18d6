//! UnifiedTable — enriched rows for a batch of instruments.

use super::enriched::{EnrichedBar, ENRICHED_COLUMNS};

/// Row-wise concatenation of per-instrument [`EnrichedBar`] sequences.
///
/// Each instrument's rows keep the order they were appended in. No ordering
/// is imposed across instruments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnifiedTable {
    rows: Vec<EnrichedBar>,
}

impl UnifiedTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<EnrichedBar>) -> Self {
        Self { rows }
    }

    /// Column names, always the fixed storage order.
    pub fn columns(&self) -> &'static [&'static str] {
        &ENRICHED_COLUMNS
    }

    /// Append one instrument's rows.
    pub fn append(&mut self, rows: Vec<EnrichedBar>) {
        self.rows.extend(rows);
    }

    pub fn rows(&self) -> &[EnrichedBar] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<EnrichedBar> {
        self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EnrichedBar> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct tickers in first-seen order.
    pub fn instruments(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for row in &self.rows {
            if !seen.contains(&row.ticker.as_str()) {
                seen.push(row.ticker.as_str());
            }
        }
        seen
    }

    /// Rows belonging to one ticker, in table order.
    pub fn rows_for<'a>(&'a self, ticker: &'a str) -> impl Iterator<Item = &'a EnrichedBar> + 'a {
        self.rows.iter().filter(move |r| r.ticker == ticker)
    }
}

impl<'a> IntoIterator for &'a UnifiedTable {
    type Item = &'a EnrichedBar;
    type IntoIter = std::slice::Iter<'a, EnrichedBar>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
