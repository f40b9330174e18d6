//! Polars view of a [`UnifiedTable`] for downstream consumers (charting,
//! notebooks). The frame always carries the eleven enriched columns in
//! storage order.

use crate::domain::{BarColumn, UnifiedTable, ENRICHED_COLUMNS};
use polars::prelude::*;

/// Expected schema for enriched bar frames.
pub struct EnrichedSchema;

impl EnrichedSchema {
    /// The canonical enriched schema, in column order.
    pub fn schema() -> Schema {
        Schema::from_iter(BarColumn::ALL.iter().map(|c| {
            let dtype = if c.is_numeric() {
                DataType::Float64
            } else {
                DataType::String
            };
            Field::new(c.name().into(), dtype)
        }))
    }

    /// Validate a DataFrame: same columns, same order, same types.
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let expected = Self::schema();
        let columns = df.get_columns();

        for (position, field) in expected.iter_fields().enumerate() {
            let Some(actual) = columns.get(position) else {
                return Err(SchemaError::MissingColumn(field.name().to_string()));
            };
            if actual.name().as_str() != field.name().as_str() {
                return Err(SchemaError::OrderMismatch {
                    position,
                    expected: field.name().to_string(),
                    actual: actual.name().to_string(),
                });
            }
            if actual.dtype() != field.dtype() {
                return Err(SchemaError::TypeMismatch {
                    column: field.name().to_string(),
                    expected: field.dtype().clone(),
                    actual: actual.dtype().clone(),
                });
            }
        }

        if columns.len() > ENRICHED_COLUMNS.len() {
            return Err(SchemaError::UnexpectedColumn(
                columns[ENRICHED_COLUMNS.len()].name().to_string(),
            ));
        }

        Ok(())
    }
}

/// Convert a table into a DataFrame with the enriched schema.
///
/// NaN values (e.g. `price_change_pct` on a zero open) are kept as NaN.
pub fn to_dataframe(table: &UnifiedTable) -> Result<DataFrame, SchemaError> {
    let rows = table.rows();
    let numeric = |column: BarColumn| -> Column {
        let values: Vec<f64> = rows
            .iter()
            .map(|r| r.numeric(column).unwrap_or(f64::NAN))
            .collect();
        Column::new(column.name().into(), values)
    };

    let mut columns = vec![
        Column::new(
            BarColumn::DateStr.name().into(),
            rows.iter().map(|r| r.date_str()).collect::<Vec<String>>(),
        ),
        Column::new(
            BarColumn::Ticker.name().into(),
            rows.iter().map(|r| r.ticker.clone()).collect::<Vec<String>>(),
        ),
    ];
    columns.extend(
        BarColumn::ALL
            .iter()
            .copied()
            .filter(|c| c.is_numeric())
            .map(numeric),
    );

    DataFrame::new(columns).map_err(|e| SchemaError::Polars(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Unexpected extra column: {0}")]
    UnexpectedColumn(String),

    #[error("Column order mismatch at position {position}: expected {expected}, got {actual}")]
    OrderMismatch {
        position: usize,
        expected: String,
        actual: String,
    },

    #[error("Type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },

    #[error("Polars error: {0}")]
    Polars(String),
}
