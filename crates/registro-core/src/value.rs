//! Backend-neutral statements, scalar values and result rows.

use std::{borrow::Cow, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{Error, Result, dialect::Dialect};

// ─── Value ───────────────────────────────────────────────────────────────────

/// A scalar bound as a statement parameter or read back from a row.
///
/// Dates travel as ISO `YYYY-MM-DD` text; backends with a native date type
/// convert at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
  Null,
  Integer(i64),
  Real(f64),
  Text(String),
}

impl Value {
  pub fn is_null(&self) -> bool { matches!(self, Self::Null) }

  pub fn as_i64(&self) -> Option<i64> {
    match self {
      Self::Integer(i) => Some(*i),
      Self::Real(f) if f.fract() == 0.0 => Some(*f as i64),
      Self::Text(s) => s.trim().parse().ok(),
      _ => None,
    }
  }

  pub fn as_f64(&self) -> Option<f64> {
    match self {
      Self::Integer(i) => Some(*i as f64),
      Self::Real(f) => Some(*f),
      Self::Text(s) => s.trim().parse().ok(),
      Self::Null => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Self::Text(s) => Some(s),
      _ => None,
    }
  }

  /// Render the value as text, as a `TEXT` column would store it.
  pub fn to_text(&self) -> Option<String> {
    match self {
      Self::Null => None,
      Self::Integer(i) => Some(i.to_string()),
      Self::Real(f) => Some(f.to_string()),
      Self::Text(s) => Some(s.clone()),
    }
  }
}

impl From<i64> for Value {
  fn from(v: i64) -> Self { Self::Integer(v) }
}

impl From<i32> for Value {
  fn from(v: i32) -> Self { Self::Integer(v.into()) }
}

impl From<u8> for Value {
  fn from(v: u8) -> Self { Self::Integer(v.into()) }
}

impl From<f64> for Value {
  fn from(v: f64) -> Self { Self::Real(v) }
}

impl From<&str> for Value {
  fn from(v: &str) -> Self { Self::Text(v.to_owned()) }
}

impl From<String> for Value {
  fn from(v: String) -> Self { Self::Text(v) }
}

impl From<&String> for Value {
  fn from(v: &String) -> Self { Self::Text(v.clone()) }
}

impl<T: Into<Value>> From<Option<T>> for Value {
  fn from(v: Option<T>) -> Self { v.map_or(Self::Null, Into::into) }
}

// ─── Statement ───────────────────────────────────────────────────────────────

/// One SQL statement plus its positional parameters.
///
/// Logical statements use `$N` markers and are translated to the active
/// dialect before execution. Raw statements are passed through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
  pub sql:    String,
  pub params: Vec<Value>,
  logical:    bool,
}

impl Statement {
  pub fn new(sql: impl Into<String>) -> Self {
    Self { sql: sql.into(), params: Vec::new(), logical: true }
  }

  pub fn raw(sql: impl Into<String>) -> Self {
    Self { sql: sql.into(), params: Vec::new(), logical: false }
  }

  pub fn bind(mut self, value: impl Into<Value>) -> Self {
    self.params.push(value.into());
    self
  }

  pub fn is_logical(&self) -> bool { self.logical }

  /// The SQL text as it must be sent to `dialect`.
  pub fn sql_for(&self, dialect: Dialect) -> Cow<'_, str> {
    if self.logical {
      dialect.translate(&self.sql)
    } else {
      Cow::Borrowed(&self.sql)
    }
  }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// A result row. Column names are shared between all rows of one result.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
  columns: Arc<[String]>,
  values:  Vec<Value>,
}

impl Row {
  pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self { Self { columns, values } }

  pub fn columns(&self) -> &[String] { &self.columns }

  pub fn values(&self) -> &[Value] { &self.values }

  pub fn get(&self, column: &str) -> Option<&Value> {
    self
      .columns
      .iter()
      .position(|c| c.eq_ignore_ascii_case(column))
      .and_then(|i| self.values.get(i))
  }

  fn require(&self, column: &str) -> Result<&Value> {
    self
      .get(column)
      .ok_or_else(|| Error::Decode(format!("column {column:?} missing from result")))
  }

  /// Nullable text column; numbers are rendered as text.
  pub fn text(&self, column: &str) -> Result<Option<String>> {
    Ok(self.require(column)?.to_text())
  }

  pub fn require_text(&self, column: &str) -> Result<String> {
    self
      .text(column)?
      .ok_or_else(|| Error::Decode(format!("column {column:?} is NULL")))
  }

  pub fn integer(&self, column: &str) -> Result<Option<i64>> {
    let value = self.require(column)?;
    if value.is_null() {
      return Ok(None);
    }
    value
      .as_i64()
      .map(Some)
      .ok_or_else(|| Error::Decode(format!("column {column:?} is not an integer: {value:?}")))
  }

  pub fn require_integer(&self, column: &str) -> Result<i64> {
    self
      .integer(column)?
      .ok_or_else(|| Error::Decode(format!("column {column:?} is NULL")))
  }

  pub fn real(&self, column: &str) -> Result<Option<f64>> {
    let value = self.require(column)?;
    if value.is_null() {
      return Ok(None);
    }
    value
      .as_f64()
      .map(Some)
      .ok_or_else(|| Error::Decode(format!("column {column:?} is not numeric: {value:?}")))
  }
}

/// Rows produced by a statement and the number of rows it affected.
///
/// For row-returning statements `affected` is the number of rows returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
  pub rows:     Vec<Row>,
  pub affected: u64,
}

impl QueryResult {
  pub fn first(&self) -> Option<&Row> { self.rows.first() }

  pub fn is_empty(&self) -> bool { self.rows.is_empty() }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn row() -> Row {
    let columns: Arc<[String]> = vec!["id".to_owned(), "carnet".to_owned(), "nota".to_owned()].into();
    Row::new(columns, vec![Value::Integer(7), Value::Text("123456".into()), Value::Null])
  }

  #[test]
  fn row_lookup_is_case_insensitive() {
    let r = row();
    assert_eq!(r.require_integer("ID").unwrap(), 7);
    assert_eq!(r.require_text("Carnet").unwrap(), "123456");
  }

  #[test]
  fn null_columns_decode_as_none() {
    let r = row();
    assert_eq!(r.text("nota").unwrap(), None);
    assert_eq!(r.integer("nota").unwrap(), None);
    assert!(r.require_text("nota").is_err());
  }

  #[test]
  fn missing_column_is_a_decode_error() {
    assert!(matches!(row().text("nope"), Err(Error::Decode(_))));
  }

  #[test]
  fn integers_render_as_text() {
    assert_eq!(row().text("id").unwrap().as_deref(), Some("7"));
  }

  #[test]
  fn raw_statements_are_not_translated() {
    let s = Statement::raw("SELECT $1");
    assert_eq!(s.sql_for(Dialect::Sqlite), "SELECT $1");
    let s = Statement::new("SELECT $1").bind(1i64);
    assert_eq!(s.sql_for(Dialect::Sqlite), "SELECT ?1");
    assert_eq!(s.params, vec![Value::Integer(1)]);
  }
}
