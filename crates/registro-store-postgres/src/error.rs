//! Mapping from `tokio-postgres` and pool errors into the core taxonomy.

use std::time::Duration;

use registro_core::{DatabaseError, Dialect, Error};

/// `query_canceled`, raised when `statement_timeout` fires.
const QUERY_CANCELED: &str = "57014";

pub fn map_error(err: tokio_postgres::Error, timeout: Duration) -> Error {
  if let Some(db) = err.as_db_error() {
    let code = db.code().code();
    if code == QUERY_CANCELED {
      return Error::Timeout(timeout);
    }
    return classify(DatabaseError {
      backend:    Dialect::Postgres,
      code:       Some(code.to_owned()),
      constraint: db.constraint().map(str::to_owned),
      message:    db.message().to_owned(),
    });
  }

  if err.is_closed() {
    return Error::Connection(err.to_string());
  }

  Error::Database(DatabaseError {
    backend:    Dialect::Postgres,
    code:       None,
    constraint: None,
    message:    err.to_string(),
  })
}

pub fn map_pool_error(err: deadpool_postgres::PoolError) -> Error {
  Error::Connection(err.to_string())
}

pub fn classify(db: DatabaseError) -> Error {
  if Dialect::Postgres.is_unique_violation(&db) {
    Error::UniqueViolation(db)
  } else {
    Error::Database(db)
  }
}
