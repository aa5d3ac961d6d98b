//! Mapping from SQLite driver errors into the core error taxonomy.

use registro_core::{DatabaseError, Dialect, Error};

pub fn map_error(err: tokio_rusqlite::Error) -> Error {
  match err {
    tokio_rusqlite::Error::Rusqlite(e) => map_rusqlite(e),
    tokio_rusqlite::Error::ConnectionClosed => {
      Error::Connection("sqlite connection closed".to_owned())
    }
    other => Error::Database(DatabaseError {
      backend:    Dialect::Sqlite,
      code:       None,
      constraint: None,
      message:    other.to_string(),
    }),
  }
}

pub fn map_rusqlite(err: rusqlite::Error) -> Error {
  let db = match &err {
    rusqlite::Error::SqliteFailure(failure, message) => DatabaseError {
      backend:    Dialect::Sqlite,
      code:       Some(failure.extended_code.to_string()),
      constraint: None,
      message:    message.clone().unwrap_or_else(|| failure.to_string()),
    },
    other => DatabaseError {
      backend:    Dialect::Sqlite,
      code:       None,
      constraint: None,
      message:    other.to_string(),
    },
  };

  if Dialect::Sqlite.is_unique_violation(&db) {
    Error::UniqueViolation(db)
  } else {
    Error::Database(db)
  }
}

/// Errors raised while opening the database file mean the backend is
/// unreachable rather than a statement failure.
pub fn map_open_error(err: tokio_rusqlite::Error) -> Error {
  Error::Connection(err.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unique_failures_become_unique_violations() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn
      .execute_batch("CREATE TABLE t (x TEXT UNIQUE); INSERT INTO t VALUES ('a');")
      .unwrap();
    let err = conn.execute("INSERT INTO t VALUES ('a')", []).unwrap_err();

    match map_rusqlite(err) {
      Error::UniqueViolation(db) => {
        assert_eq!(db.code.as_deref(), Some("2067"));
        assert!(db.message.contains("t.x"));
      }
      other => panic!("expected unique violation, got {other:?}"),
    }
  }

  #[test]
  fn syntax_errors_stay_database_errors() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    let err = conn.execute("SELEC 1", []).unwrap_err();
    assert!(matches!(map_rusqlite(err), Error::Database(_)));
  }
}
