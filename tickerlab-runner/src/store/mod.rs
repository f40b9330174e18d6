//! Relation store: persist and reload unified tables by name.

pub mod query;
pub mod sqlite;

pub use query::{Condition, Direction, Filter, Literal, Op, OrderBy, QueryParseError};
pub use sqlite::{RelationInfo, SqliteStore, DEFAULT_DB_PATH, DEFAULT_RELATION};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A write (drop, create, insert, meta update or commit) failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A reload could not run: bad relation name, missing or incompatible
    /// relation, malformed filter or ordering.
    #[error("query error: {0}")]
    Query(String),
}

impl From<QueryParseError> for StoreError {
    fn from(e: QueryParseError) -> Self {
        StoreError::Query(e.to_string())
    }
}

/// Prefix reserved for the store's own bookkeeping tables.
pub const RESERVED_PREFIX: &str = "__";

/// Relation names are plain identifiers: `[A-Za-z_][A-Za-z0-9_]*`, not
/// starting with the reserved prefix.
pub fn validate_relation_name(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    let first = match chars.next() {
        Some(ch) => ch,
        None => return Err("relation name is empty".to_string()),
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(format!("invalid relation name: {name}"));
    }
    if !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        return Err(format!("invalid relation name: {name}"));
    }
    if name.starts_with(RESERVED_PREFIX) {
        return Err(format!("relation name is reserved: {name}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_names() {
        assert!(validate_relation_name("market_bars").is_ok());
        assert!(validate_relation_name("_private").is_ok());
        assert!(validate_relation_name("Bars2024").is_ok());

        assert!(validate_relation_name("").is_err());
        assert!(validate_relation_name("2024bars").is_err());
        assert!(validate_relation_name("bars;drop").is_err());
        assert!(validate_relation_name("market bars").is_err());
        assert!(validate_relation_name("main.bars").is_err());
        assert!(validate_relation_name("__relation_meta").is_err());
    }

    #[test]
    fn parse_errors_become_query_errors() {
        let err: StoreError = "bogus=1".parse::<Condition>().unwrap_err().into();
        assert!(matches!(err, StoreError::Query(msg) if msg.contains("bogus")));
    }
}
