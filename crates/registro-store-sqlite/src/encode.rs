//! Conversions between core [`Value`]s and `rusqlite` values, and the
//! statement runner shared by single calls and transactions.

use std::sync::Arc;

use registro_core::{QueryResult, Row, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};

pub fn encode_value(value: &Value) -> SqlValue {
  match value {
    Value::Null       => SqlValue::Null,
    Value::Integer(i) => SqlValue::Integer(*i),
    Value::Real(f)    => SqlValue::Real(*f),
    Value::Text(s)    => SqlValue::Text(s.clone()),
  }
}

pub fn decode_value(value: ValueRef<'_>) -> Value {
  match value {
    ValueRef::Null       => Value::Null,
    ValueRef::Integer(i) => Value::Integer(i),
    ValueRef::Real(f)    => Value::Real(f),
    ValueRef::Text(t) | ValueRef::Blob(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
  }
}

/// Run one statement on `conn`, collecting rows when it yields any.
pub fn run(
  conn: &rusqlite::Connection,
  sql: &str,
  params: &[SqlValue],
) -> rusqlite::Result<QueryResult> {
  let mut stmt = conn.prepare(sql)?;
  let columns: Arc<[String]> = stmt
    .column_names()
    .into_iter()
    .map(str::to_owned)
    .collect();

  if columns.is_empty() {
    let affected = stmt.execute(rusqlite::params_from_iter(params.iter()))?;
    return Ok(QueryResult { rows: Vec::new(), affected: affected as u64 });
  }

  let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
  let mut out = Vec::new();
  while let Some(row) = rows.next()? {
    let values = (0..columns.len())
      .map(|i| row.get_ref(i).map(decode_value))
      .collect::<rusqlite::Result<Vec<_>>>()?;
    out.push(Row::new(columns.clone(), values));
  }

  Ok(QueryResult { affected: out.len() as u64, rows: out })
}
