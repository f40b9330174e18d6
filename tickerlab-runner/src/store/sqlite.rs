//! SQLite-backed relation store.
//!
//! Every persist is a full replace of the named relation inside one
//! transaction, plus a row in the `__relation_meta` bookkeeping table. Readers
//! on other connections see either the previous generation or the new one.
//!
//! NaN values (e.g. `price_change_pct` on a zero open) are stored as NULL and
//! read back as NaN.

use super::query::{Filter, OrderBy};
use super::{validate_relation_name, StoreError};
use chrono::NaiveDateTime;
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use tickerlab_core::domain::{EnrichedBar, UnifiedTable, DATE_STR_FORMAT, ENRICHED_COLUMNS};

/// Database file used when none is given.
pub const DEFAULT_DB_PATH: &str = "crypto_data.db";

/// Relation name used when none is given.
pub const DEFAULT_RELATION: &str = "market_bars";

const META_TABLE: &str = "__relation_meta";

/// Bookkeeping for one persisted relation.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationInfo {
    pub name: String,
    pub row_count: usize,
    /// BLAKE3 hex digest of the persisted rows.
    pub data_hash: String,
    /// RFC 3339 UTC timestamp of the persist.
    pub persisted_at: String,
}

pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Persistence(format!("open {}: {e}", path.display())))?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// A private database that lives as long as the store.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Persistence(format!("open in-memory database: {e}")))?;
        Ok(Self { conn, path: None })
    }

    /// Database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Replace `relation` with the rows of `table`.
    ///
    /// Returns the row count read back from the relation after commit.
    pub fn persist(&mut self, relation: &str, table: &UnifiedTable) -> Result<usize, StoreError> {
        validate_relation_name(relation).map_err(StoreError::Persistence)?;
        let write_err = |step: &str, e: rusqlite::Error| {
            StoreError::Persistence(format!("{step} '{relation}': {e}"))
        };

        let tx = self
            .conn
            .transaction()
            .map_err(|e| write_err("begin", e))?;

        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS \"{relation}\";
             CREATE TABLE \"{relation}\" ({columns});
             CREATE TABLE IF NOT EXISTS {META_TABLE} (
                 relation     TEXT PRIMARY KEY COLLATE NOCASE,
                 row_count    INTEGER NOT NULL,
                 data_hash    TEXT NOT NULL,
                 persisted_at TEXT NOT NULL
             );",
            columns = column_definitions(),
        ))
        .map_err(|e| write_err("create", e))?;

        {
            let placeholders = vec!["?"; ENRICHED_COLUMNS.len()].join(", ");
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT INTO \"{relation}\" ({}) VALUES ({placeholders})",
                    quoted_columns()
                ))
                .map_err(|e| write_err("prepare insert into", e))?;
            for row in table {
                stmt.execute(params![
                    row.date_str(),
                    row.ticker,
                    real(row.open),
                    real(row.high),
                    real(row.low),
                    real(row.close),
                    real(row.volume),
                    real(row.price_change),
                    real(row.price_change_pct),
                    real(row.high_low_diff),
                    real(row.ma5),
                ])
                .map_err(|e| write_err("insert into", e))?;
            }
        }

        tx.execute(
            &format!(
                "INSERT OR REPLACE INTO {META_TABLE} (relation, row_count, data_hash, persisted_at)
                 VALUES (?1, ?2, ?3, ?4)"
            ),
            params![
                relation,
                table.len() as i64,
                data_hash(table),
                chrono::Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| write_err("record meta for", e))?;

        tx.commit().map_err(|e| write_err("commit", e))?;

        let count: i64 = self
            .conn
            .query_row(&format!("SELECT count(*) FROM \"{relation}\""), [], |r| r.get(0))
            .map_err(|e| write_err("count", e))?;

        tracing::info!(relation, rows = count, "persisted relation");
        Ok(count as usize)
    }

    /// Reload `relation` with `filter` applied and rows sorted by `order`.
    ///
    /// An empty `order` leaves the row order to SQLite (insertion order in
    /// practice). There is no implicit row limit.
    pub fn load(
        &self,
        relation: &str,
        filter: &Filter,
        order: &[OrderBy],
    ) -> Result<UnifiedTable, StoreError> {
        validate_relation_name(relation).map_err(StoreError::Query)?;
        self.check_compatible(relation)?;

        let (clause, params) = filter.to_sql();
        let mut sql = format!("SELECT {} FROM \"{relation}\"", quoted_columns());
        if !clause.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
        if !order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&OrderBy::to_sql(order));
        }
        tracing::debug!(relation, sql = %sql, params = params.len(), "loading relation");

        let query_err = |e: rusqlite::Error| StoreError::Query(format!("load '{relation}': {e}"));
        let params_ref: Vec<&dyn ToSql> = params.iter().map(|b| b.as_ref()).collect();
        let mut stmt = self.conn.prepare(&sql).map_err(query_err)?;
        let rows = stmt
            .query_map(params_ref.as_slice(), read_row)
            .map_err(query_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_err)?;

        tracing::info!(relation, rows = rows.len(), "loaded relation");
        Ok(UnifiedTable::from_rows(rows))
    }

    /// Every relation this store has persisted, by name.
    pub fn relations(&self) -> Result<Vec<RelationInfo>, StoreError> {
        let query_err = |e: rusqlite::Error| StoreError::Query(format!("list relations: {e}"));
        if !self.table_exists(META_TABLE).map_err(query_err)? {
            return Ok(Vec::new());
        }

        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT relation, row_count, data_hash, persisted_at FROM {META_TABLE} ORDER BY relation"
            ))
            .map_err(query_err)?;
        let infos = stmt
            .query_map([], |row| {
                Ok(RelationInfo {
                    name: row.get(0)?,
                    row_count: row.get::<_, i64>(1)? as usize,
                    data_hash: row.get(2)?,
                    persisted_at: row.get(3)?,
                })
            })
            .map_err(query_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_err)?;
        Ok(infos)
    }

    /// Bookkeeping for one relation, if it was persisted by this store.
    ///
    /// Relation names are case-insensitive, as SQLite table names are.
    pub fn relation_info(&self, relation: &str) -> Result<Option<RelationInfo>, StoreError> {
        Ok(self
            .relations()?
            .into_iter()
            .find(|r| r.name.eq_ignore_ascii_case(relation)))
    }

    fn table_exists(&self, name: &str) -> rusqlite::Result<bool> {
        self.conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1 LIMIT 1",
                [name],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
    }

    /// The relation must exist with exactly the enriched columns, in order.
    fn check_compatible(&self, relation: &str) -> Result<(), StoreError> {
        let query_err =
            |e: rusqlite::Error| StoreError::Query(format!("inspect '{relation}': {e}"));
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info(\"{relation}\")"))
            .map_err(query_err)?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(query_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_err)?;

        if columns.is_empty() {
            return Err(StoreError::Query(format!("relation '{relation}' does not exist")));
        }
        if columns != ENRICHED_COLUMNS {
            return Err(StoreError::Query(format!(
                "relation '{relation}' has incompatible columns: {}",
                columns.join(", ")
            )));
        }
        Ok(())
    }
}

fn column_definitions() -> String {
    ENRICHED_COLUMNS
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let ty = if i < 2 { "TEXT" } else { "REAL" };
            format!("\"{name}\" {ty}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn quoted_columns() -> String {
    ENRICHED_COLUMNS
        .iter()
        .map(|name| format!("\"{name}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

fn real(value: f64) -> Option<f64> {
    (!value.is_nan()).then_some(value)
}

fn read_real(row: &Row<'_>, idx: usize) -> rusqlite::Result<f64> {
    Ok(row.get::<_, Option<f64>>(idx)?.unwrap_or(f64::NAN))
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<EnrichedBar> {
    let date_str: String = row.get(0)?;
    let timestamp = NaiveDateTime::parse_from_str(&date_str, DATE_STR_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    Ok(EnrichedBar {
        timestamp,
        ticker: row.get(1)?,
        open: read_real(row, 2)?,
        high: read_real(row, 3)?,
        low: read_real(row, 4)?,
        close: read_real(row, 5)?,
        volume: read_real(row, 6)?,
        price_change: read_real(row, 7)?,
        price_change_pct: read_real(row, 8)?,
        high_low_diff: read_real(row, 9)?,
        ma5: read_real(row, 10)?,
    })
}

/// BLAKE3 over every row's textual record.
fn data_hash(table: &UnifiedTable) -> String {
    let mut hasher = blake3::Hasher::new();
    for row in table {
        for field in row.to_record() {
            hasher.update(field.as_bytes());
            hasher.update(&[0x1f]);
        }
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::query::Condition;
    use chrono::NaiveDate;
    use tickerlab_core::domain::BarColumn;

    fn row(ticker: &str, day: u32, close: f64) -> EnrichedBar {
        EnrichedBar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            ticker: ticker.into(),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 10.0,
            price_change: 1.0,
            price_change_pct: 1.0 / (close - 1.0) * 100.0,
            high_low_diff: 3.0,
            ma5: close,
        }
    }

    fn sample() -> UnifiedTable {
        UnifiedTable::from_rows(vec![
            row("KRW-BTC", 1, 100.0),
            row("KRW-BTC", 2, 110.0),
            row("KRW-ETH", 1, 50.0),
            row("KRW-ETH", 2, 40.0),
        ])
    }

    #[test]
    fn persist_then_load_all_returns_same_rows() {
        let mut store = SqliteStore::in_memory().unwrap();
        let table = sample();
        let n = store.persist("market_bars", &table).unwrap();
        assert_eq!(n, 4);

        let loaded = store.load("market_bars", &Filter::all(), &[]).unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn nan_round_trips_through_null() {
        let mut store = SqliteStore::in_memory().unwrap();
        let mut r = row("KRW-ZERO", 3, 5.0);
        r.open = 0.0;
        r.price_change_pct = f64::NAN;
        store
            .persist("bars", &UnifiedTable::from_rows(vec![r]))
            .unwrap();

        let loaded = store.load("bars", &Filter::all(), &[]).unwrap();
        assert_eq!(loaded.rows()[0].open, 0.0);
        assert!(loaded.rows()[0].price_change_pct.is_nan());

        let nulls: i64 = store
            .conn
            .query_row(
                "SELECT count(*) FROM bars WHERE price_change_pct IS NULL",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(nulls, 1);
    }

    #[test]
    fn sub_second_timestamps_reload_truncated() {
        let mut store = SqliteStore::in_memory().unwrap();
        let mut r = row("KRW-BTC", 4, 10.0);
        let whole = r.timestamp;
        r.timestamp += chrono::Duration::milliseconds(250);
        store
            .persist("bars", &UnifiedTable::from_rows(vec![r.clone()]))
            .unwrap();

        let loaded = store.load("bars", &Filter::all(), &[]).unwrap();
        assert_eq!(loaded.rows()[0].timestamp, whole);
        assert_eq!(loaded.rows()[0].close, r.close);
    }

    #[test]
    fn filter_and_order_apply() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.persist("market_bars", &sample()).unwrap();

        let filter = Filter::all()
            .and("ticker=KRW-ETH".parse().unwrap())
            .and("close>=45".parse().unwrap());
        let loaded = store.load("market_bars", &filter, &[]).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.rows()[0].close, 50.0);

        let ordered = store
            .load("market_bars", &Filter::all(), &[OrderBy::desc(BarColumn::Close)])
            .unwrap();
        let closes: Vec<f64> = ordered.iter().map(|r| r.close).collect();
        assert_eq!(closes, vec![110.0, 100.0, 50.0, 40.0]);
    }

    #[test]
    fn default_order_is_newest_first() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.persist("market_bars", &sample()).unwrap();
        let loaded = store
            .load("market_bars", &Filter::all(), &OrderBy::newest_first())
            .unwrap();
        assert_eq!(loaded.rows()[0].date_str(), "2024-01-02 09:00:00");
        assert_eq!(loaded.rows()[3].date_str(), "2024-01-01 09:00:00");
    }

    #[test]
    fn pattern_filter_matches_prefix() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.persist("market_bars", &sample()).unwrap();
        let filter = Filter::all().and("ticker~KRW-B%".parse::<Condition>().unwrap());
        let loaded = store.load("market_bars", &filter, &[]).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.iter().all(|r| r.ticker == "KRW-BTC"));
    }

    #[test]
    fn missing_relation_is_query_error() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(matches!(
            store.load("nothing_here", &Filter::all(), &[]),
            Err(StoreError::Query(_))
        ));
    }

    #[test]
    fn incompatible_relation_is_query_error() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .conn
            .execute_batch("CREATE TABLE legacy (date_str TEXT, ticker TEXT, close REAL);")
            .unwrap();
        let err = store.load("legacy", &Filter::all(), &[]).unwrap_err();
        assert!(matches!(err, StoreError::Query(msg) if msg.contains("incompatible")));
    }

    #[test]
    fn invalid_names_are_rejected_per_operation() {
        let mut store = SqliteStore::in_memory().unwrap();
        assert!(matches!(
            store.persist("bad name", &sample()),
            Err(StoreError::Persistence(_))
        ));
        assert!(matches!(
            store.persist("__relation_meta", &sample()),
            Err(StoreError::Persistence(_))
        ));
        assert!(matches!(
            store.load("x;drop table market_bars", &Filter::all(), &[]),
            Err(StoreError::Query(_))
        ));
    }

    #[test]
    fn relations_lists_meta() {
        let mut store = SqliteStore::in_memory().unwrap();
        assert!(store.relations().unwrap().is_empty());

        store.persist("b_rel", &sample()).unwrap();
        store
            .persist("a_rel", &UnifiedTable::from_rows(vec![row("KRW-BTC", 5, 1.0)]))
            .unwrap();

        let infos = store.relations().unwrap();
        let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a_rel", "b_rel"]);
        assert_eq!(infos[1].row_count, 4);
        assert_eq!(infos[1].data_hash, data_hash(&sample()));
        assert_eq!(infos[1].data_hash.len(), 64);
    }

    #[test]
    fn names_differing_in_case_share_one_meta_row() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.persist("Bars", &sample()).unwrap();
        let single = UnifiedTable::from_rows(vec![row("KRW-BTC", 5, 1.0)]);
        store.persist("bars", &single).unwrap();

        let infos = store.relations().unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].name, "bars");
        assert_eq!(infos[0].row_count, 1);

        let loaded = store.load("Bars", &Filter::all(), &[]).unwrap();
        let info = store.relation_info("BARS").unwrap().unwrap();
        assert_eq!(info.row_count, loaded.len());
        assert_eq!(info.data_hash, data_hash(&single));
    }

    #[test]
    fn data_hash_depends_on_content() {
        let a = sample();
        let mut rows = sample().into_rows();
        rows[0].close += 1.0;
        let b = UnifiedTable::from_rows(rows);
        assert_ne!(data_hash(&a), data_hash(&b));
        assert_eq!(data_hash(&a), data_hash(&sample()));
    }
}
