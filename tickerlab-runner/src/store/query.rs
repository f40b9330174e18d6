//! Structured reload predicates.
//!
//! A [`Filter`] is a conjunction of [`Condition`]s over the closed
//! [`BarColumn`] set; an ordering is a list of [`OrderBy`] keys. Both compile
//! to SQL where column names come from the enum and every literal is bound as
//! a parameter. The textual forms (`close>=100`, `ticker=KRW-BTC`,
//! `date_str desc`) parse into the same values.

use rusqlite::types::ToSql;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tickerlab_core::domain::BarColumn;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryParseError {
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("no comparison operator in '{0}'")]
    MissingOperator(String),

    #[error("missing value in '{0}'")]
    MissingValue(String),

    #[error("column {column} is numeric but '{value}' is not a number")]
    NotANumber { column: BarColumn, value: String },

    #[error("pattern match (~) needs a text column, got {0}")]
    PatternOnNumeric(BarColumn),

    #[error("unknown sort direction '{0}' (use asc or desc)")]
    BadDirection(String),
}

/// Comparison operator of a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// SQL `LIKE` with `%` and `_` wildcards.
    Like,
}

impl Op {
    fn sql(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Like => "LIKE",
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Op::Like => "~",
            other => other.sql(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
}

impl Literal {
    fn to_sql_value(&self) -> Box<dyn ToSql> {
        match self {
            Literal::Number(n) => Box::new(*n),
            Literal::Text(s) => Box::new(s.clone()),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{n}"),
            Literal::Text(s) => f.write_str(s),
        }
    }
}

/// `column op literal`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: BarColumn,
    pub op: Op,
    pub value: Literal,
}

impl Condition {
    /// Build a condition, checking the literal against the column type.
    pub fn new(column: BarColumn, op: Op, value: Literal) -> Result<Self, QueryParseError> {
        match (&value, column.is_numeric()) {
            (_, true) if op == Op::Like => return Err(QueryParseError::PatternOnNumeric(column)),
            (Literal::Text(s), true) => {
                return Err(QueryParseError::NotANumber {
                    column,
                    value: s.clone(),
                })
            }
            _ => {}
        }
        let value = match value {
            Literal::Number(n) if !column.is_numeric() => Literal::Text(n.to_string()),
            v => v,
        };
        Ok(Self { column, op, value })
    }

    pub fn eq(column: BarColumn, value: impl Into<String>) -> Result<Self, QueryParseError> {
        let value = value.into();
        let literal = if column.is_numeric() {
            parse_number(column, &value)?
        } else {
            Literal::Text(value)
        };
        Self::new(column, Op::Eq, literal)
    }

    fn to_sql(&self) -> String {
        format!("\"{}\" {} ?", self.column.name(), self.op.sql())
    }
}

fn parse_number(column: BarColumn, raw: &str) -> Result<Literal, QueryParseError> {
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(Literal::Number(n)),
        _ => Err(QueryParseError::NotANumber {
            column,
            value: raw.to_string(),
        }),
    }
}

fn unquote(raw: &str) -> &str {
    for q in ['\'', '"'] {
        if raw.len() >= 2 && raw.starts_with(q) && raw.ends_with(q) {
            return &raw[1..raw.len() - 1];
        }
    }
    raw
}

impl FromStr for Condition {
    type Err = QueryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let at = s
            .find(['<', '>', '=', '!', '~'])
            .ok_or_else(|| QueryParseError::MissingOperator(s.to_string()))?;
        let rest = &s[at..];
        let (op, width) = if rest.starts_with(">=") {
            (Op::Ge, 2)
        } else if rest.starts_with("<=") {
            (Op::Le, 2)
        } else if rest.starts_with("!=") || rest.starts_with("<>") {
            (Op::Ne, 2)
        } else if rest.starts_with("==") {
            (Op::Eq, 2)
        } else if rest.starts_with('=') {
            (Op::Eq, 1)
        } else if rest.starts_with('>') {
            (Op::Gt, 1)
        } else if rest.starts_with('<') {
            (Op::Lt, 1)
        } else if rest.starts_with('~') {
            (Op::Like, 1)
        } else {
            return Err(QueryParseError::MissingOperator(s.to_string()));
        };

        let name = s[..at].trim();
        let column = BarColumn::from_name(name)
            .ok_or_else(|| QueryParseError::UnknownColumn(name.to_string()))?;
        let raw = unquote(s[at + width..].trim());
        if raw.is_empty() {
            return Err(QueryParseError::MissingValue(s.to_string()));
        }

        let value = if column.is_numeric() && op != Op::Like {
            parse_number(column, raw)?
        } else {
            Literal::Text(raw.to_string())
        };
        Self::new(column, op, value)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.column, self.op.symbol(), self.value)
    }
}

/// Conjunction of conditions. Empty matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// Matches every row.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Parse one textual condition per element.
    pub fn parse_all<S: AsRef<str>>(conditions: &[S]) -> Result<Self, QueryParseError> {
        let mut filter = Self::all();
        for c in conditions {
            filter = filter.and(c.as_ref().parse()?);
        }
        Ok(filter)
    }

    /// WHERE body (without the keyword) and its bound parameters.
    /// Returns an empty clause for the match-all filter.
    pub(crate) fn to_sql(&self) -> (String, Vec<Box<dyn ToSql>>) {
        let clause = self
            .conditions
            .iter()
            .map(Condition::to_sql)
            .collect::<Vec<_>>()
            .join(" AND ");
        let params = self.conditions.iter().map(|c| c.value.to_sql_value()).collect();
        (clause, params)
    }
}

impl FromIterator<Condition> for Filter {
    fn from_iter<I: IntoIterator<Item = Condition>>(iter: I) -> Self {
        Self {
            conditions: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// One sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: BarColumn,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(column: BarColumn) -> Self {
        Self {
            column,
            direction: Direction::Asc,
        }
    }

    pub fn desc(column: BarColumn) -> Self {
        Self {
            column,
            direction: Direction::Desc,
        }
    }

    /// Newest first, the reload default.
    pub fn newest_first() -> Vec<OrderBy> {
        vec![Self::desc(BarColumn::DateStr)]
    }

    pub fn parse_all<S: AsRef<str>>(keys: &[S]) -> Result<Vec<Self>, QueryParseError> {
        keys.iter().map(|k| k.as_ref().parse()).collect()
    }

    pub(crate) fn to_sql(keys: &[OrderBy]) -> String {
        keys.iter()
            .map(|k| {
                let dir = match k.direction {
                    Direction::Asc => "ASC",
                    Direction::Desc => "DESC",
                };
                format!("\"{}\" {dir}", k.column.name())
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for OrderBy {
    type Err = QueryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let column = BarColumn::from_name(name)
            .ok_or_else(|| QueryParseError::UnknownColumn(name.to_string()))?;
        let direction = match parts.next().map(|d| d.to_ascii_lowercase()) {
            None => Direction::Asc,
            Some(d) if d == "asc" => Direction::Asc,
            Some(d) if d == "desc" => Direction::Desc,
            Some(d) => return Err(QueryParseError::BadDirection(d)),
        };
        if let Some(extra) = parts.next() {
            return Err(QueryParseError::BadDirection(extra.to_string()));
        }
        Ok(Self { column, direction })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_condition() {
        let c: Condition = "close>=100".parse().unwrap();
        assert_eq!(c.column, BarColumn::Close);
        assert_eq!(c.op, Op::Ge);
        assert_eq!(c.value, Literal::Number(100.0));
        assert_eq!(c.to_string(), "close>=100");
    }

    #[test]
    fn parses_text_condition_with_quotes_and_spaces() {
        let c: Condition = " ticker = 'KRW-BTC' ".parse().unwrap();
        assert_eq!(c.column, BarColumn::Ticker);
        assert_eq!(c.op, Op::Eq);
        assert_eq!(c.value, Literal::Text("KRW-BTC".into()));

        let c: Condition = "date_str>2024-01-03 00:00:00".parse().unwrap();
        assert_eq!(c.op, Op::Gt);
        assert_eq!(c.value, Literal::Text("2024-01-03 00:00:00".into()));
    }

    #[test]
    fn parses_every_operator() {
        let cases = [
            ("open=1", Op::Eq),
            ("open==1", Op::Eq),
            ("open!=1", Op::Ne),
            ("open<>1", Op::Ne),
            ("open<1", Op::Lt),
            ("open<=1", Op::Le),
            ("open>1", Op::Gt),
            ("open>=1", Op::Ge),
            ("ticker~KRW-%", Op::Like),
        ];
        for (text, op) in cases {
            assert_eq!(text.parse::<Condition>().unwrap().op, op, "{text}");
        }
    }

    #[test]
    fn rejects_bad_conditions() {
        assert!(matches!(
            "nonexistent=1".parse::<Condition>(),
            Err(QueryParseError::UnknownColumn(_))
        ));
        assert!(matches!(
            "close".parse::<Condition>(),
            Err(QueryParseError::MissingOperator(_))
        ));
        assert!(matches!(
            "close>=".parse::<Condition>(),
            Err(QueryParseError::MissingValue(_))
        ));
        assert!(matches!(
            "close>=abc".parse::<Condition>(),
            Err(QueryParseError::NotANumber { .. })
        ));
        assert!(matches!(
            "close~1%".parse::<Condition>(),
            Err(QueryParseError::PatternOnNumeric(BarColumn::Close))
        ));
        assert!(matches!(
            "1=1".parse::<Condition>(),
            Err(QueryParseError::UnknownColumn(_))
        ));
    }

    #[test]
    fn injection_text_stays_a_literal() {
        let c: Condition = "ticker=x' OR 1=1 --".parse().unwrap();
        let (sql, params) = Filter::all().and(c).to_sql();
        assert_eq!(sql, "\"ticker\" = ?");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn filter_compiles_conjunction() {
        let filter = Filter::parse_all(&["close>=100", "ticker=KRW-BTC"]).unwrap();
        let (sql, params) = filter.to_sql();
        assert_eq!(sql, "\"close\" >= ? AND \"ticker\" = ?");
        assert_eq!(params.len(), 2);

        let (sql, params) = Filter::all().to_sql();
        assert!(sql.is_empty());
        assert!(params.is_empty());
    }

    #[test]
    fn order_by_parsing() {
        let keys = OrderBy::parse_all(&["date_str desc", "ticker", "CLOSE ASC"]).unwrap();
        assert_eq!(
            keys,
            vec![
                OrderBy::desc(BarColumn::DateStr),
                OrderBy::asc(BarColumn::Ticker),
                OrderBy::asc(BarColumn::Close),
            ]
        );
        assert_eq!(
            OrderBy::to_sql(&keys),
            "\"date_str\" DESC, \"ticker\" ASC, \"close\" ASC"
        );
        assert!(matches!(
            "close sideways".parse::<OrderBy>(),
            Err(QueryParseError::BadDirection(_))
        ));
        assert!(matches!(
            "bogus desc".parse::<OrderBy>(),
            Err(QueryParseError::UnknownColumn(_))
        ));
    }

    #[test]
    fn equality_helper_checks_types() {
        assert!(Condition::eq(BarColumn::Ticker, "KRW-BTC").is_ok());
        assert!(Condition::eq(BarColumn::Close, "12.5").is_ok());
        assert!(Condition::eq(BarColumn::Close, "twelve").is_err());
    }
}
