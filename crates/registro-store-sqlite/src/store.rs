//! [`SqliteStore`] — the SQLite implementation of [`Store`].

use std::{path::Path, sync::Arc, time::Duration};

use registro_core::{Dialect, Error, QueryResult, Result, Statement, Store};
use rusqlite::{InterruptHandle, types::Value as SqlValue};

use crate::{
  encode::{encode_value, run},
  error::{map_error, map_open_error},
};

// ─── Settings ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct SqliteSettings {
  /// How long a writer waits on a locked database before failing.
  pub busy_timeout:      Duration,
  /// Upper bound on a single `execute` or `transaction` call.
  pub statement_timeout: Duration,
}

impl Default for SqliteSettings {
  fn default() -> Self {
    Self {
      busy_timeout:      Duration::from_millis(5_000),
      statement_timeout: Duration::from_secs(30),
    }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A records store backed by a single SQLite file.
///
/// Cloning is cheap; clones share the one connection and its worker thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn:      tokio_rusqlite::Connection,
  interrupt: Arc<InterruptHandle>,
  timeout:   Duration,
}

impl SqliteStore {
  /// Open (or create) the database at `path`.
  pub async fn open(path: impl AsRef<Path>, settings: SqliteSettings) -> Result<Self> {
    let path = path.as_ref().to_owned();
    tracing::debug!(path = %path.display(), "opening sqlite database");
    let conn = tokio_rusqlite::Connection::open(&path)
      .await
      .map_err(map_open_error)?;
    Self::configure(conn, settings).await
  }

  /// Open a private in-memory database — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory()
      .await
      .map_err(map_open_error)?;
    Self::configure(conn, SqliteSettings::default()).await
  }

  async fn configure(conn: tokio_rusqlite::Connection, settings: SqliteSettings) -> Result<Self> {
    let busy_ms = settings.busy_timeout.as_millis();
    let interrupt = conn
      .call(move |conn| {
        conn.execute_batch(&format!(
          "PRAGMA journal_mode = WAL;
           PRAGMA foreign_keys = ON;
           PRAGMA busy_timeout = {busy_ms};"
        ))?;
        Ok(conn.get_interrupt_handle())
      })
      .await
      .map_err(map_open_error)?;

    Ok(Self {
      conn,
      interrupt: Arc::new(interrupt),
      timeout: settings.statement_timeout,
    })
  }

  /// Await `fut`, interrupting the running statement if it overruns.
  async fn bounded<T>(
    &self,
    fut: impl std::future::Future<Output = Result<T, tokio_rusqlite::Error>>,
  ) -> Result<T> {
    match tokio::time::timeout(self.timeout, fut).await {
      Ok(result) => result.map_err(map_error),
      Err(_) => {
        self.interrupt.interrupt();
        tracing::warn!(timeout = ?self.timeout, "sqlite statement timed out");
        Err(Error::Timeout(self.timeout))
      }
    }
  }
}

fn prepare(statement: &Statement) -> (String, Vec<SqlValue>) {
  let sql = statement.sql_for(Dialect::Sqlite).into_owned();
  let params = statement.params.iter().map(encode_value).collect();
  (sql, params)
}

impl Store for SqliteStore {
  fn dialect(&self) -> Dialect { Dialect::Sqlite }

  async fn execute(&self, statement: Statement) -> Result<QueryResult> {
    let (sql, params) = prepare(&statement);
    tracing::trace!(sql = %sql, params = params.len(), "execute");
    self
      .bounded(self.conn.call(move |conn| Ok(run(conn, &sql, &params)?)))
      .await
  }

  async fn transaction(&self, statements: Vec<Statement>) -> Result<Vec<QueryResult>> {
    let prepared: Vec<_> = statements.iter().map(prepare).collect();
    tracing::trace!(statements = prepared.len(), "transaction");
    self
      .bounded(self.conn.call(move |conn| {
        let tx = conn.transaction()?;
        let mut results = Vec::with_capacity(prepared.len());
        for (sql, params) in &prepared {
          results.push(run(&tx, sql, params)?);
        }
        tx.commit()?;
        Ok(results)
      }))
      .await
  }
}
