//! [`PostgresStore`] — the PostgreSQL implementation of [`Store`].

use std::time::Duration;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use registro_core::{Dialect, Error, QueryResult, Result, Statement, Store};
use tokio_postgres::{GenericClient, NoTls, types::ToSql};

use crate::{
  encode::{PgParam, decode_rows},
  error::{map_error, map_pool_error},
};

#[derive(Debug, Clone, Copy)]
pub struct PostgresSettings {
  pub pool_max_size:     usize,
  pub statement_timeout: Duration,
}

impl Default for PostgresSettings {
  fn default() -> Self {
    Self {
      pool_max_size:     8,
      statement_timeout: Duration::from_secs(30),
    }
  }
}

/// A pooled PostgreSQL connection set. Cloning shares the pool.
#[derive(Clone)]
pub struct PostgresStore {
  pool:    Pool,
  timeout: Duration,
}

impl PostgresStore {
  /// Build the pool for `url` and check that the server answers.
  pub async fn connect(url: &str, settings: PostgresSettings) -> Result<Self> {
    let mut config: tokio_postgres::Config = url
      .parse()
      .map_err(|e| Error::Config(format!("invalid database url: {e}")))?;
    config.options(&format!(
      "-c statement_timeout={}",
      settings.statement_timeout.as_millis()
    ));
    config.connect_timeout(settings.statement_timeout);

    let manager = Manager::from_config(config, NoTls, ManagerConfig {
      recycling_method: RecyclingMethod::Fast,
    });
    let pool = Pool::builder(manager)
      .max_size(settings.pool_max_size)
      .build()
      .map_err(|e| Error::Config(format!("cannot build connection pool: {e}")))?;

    let store = Self { pool, timeout: settings.statement_timeout };
    store
      .execute(Statement::raw("SELECT 1"))
      .await
      .map_err(|e| match e {
        Error::Connection(reason) => Error::Connection(reason),
        other => Error::Connection(other.to_string()),
      })?;
    tracing::debug!(max_size = settings.pool_max_size, "postgres pool ready");
    Ok(store)
  }

  async fn bounded<T>(&self, fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(self.timeout, fut)
      .await
      .unwrap_or_else(|_| {
        tracing::warn!(timeout = ?self.timeout, "postgres call timed out");
        Err(Error::Timeout(self.timeout))
      })
  }
}

/// Run one statement; row-returning statements report their row count.
async fn run<C>(client: &C, statement: &Statement, timeout: Duration) -> Result<QueryResult>
where
  C: GenericClient + Sync,
{
  let sql = statement.sql_for(Dialect::Postgres);
  let prepared = client
    .prepare(&sql)
    .await
    .map_err(|e| map_error(e, timeout))?;

  let params: Vec<PgParam<'_>> = statement.params.iter().map(PgParam).collect();
  let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

  if prepared.columns().is_empty() {
    let affected = client
      .execute(&prepared, &refs)
      .await
      .map_err(|e| map_error(e, timeout))?;
    return Ok(QueryResult { rows: Vec::new(), affected });
  }

  let rows = client
    .query(&prepared, &refs)
    .await
    .map_err(|e| map_error(e, timeout))?;
  let rows = decode_rows(&rows)?;
  Ok(QueryResult { affected: rows.len() as u64, rows })
}

impl Store for PostgresStore {
  fn dialect(&self) -> Dialect { Dialect::Postgres }

  async fn execute(&self, statement: Statement) -> Result<QueryResult> {
    tracing::trace!(sql = %statement.sql, params = statement.params.len(), "execute");
    self
      .bounded(async {
        let client = self.pool.get().await.map_err(map_pool_error)?;
        run(&**client, &statement, self.timeout).await
      })
      .await
  }

  async fn transaction(&self, statements: Vec<Statement>) -> Result<Vec<QueryResult>> {
    tracing::trace!(statements = statements.len(), "transaction");
    self
      .bounded(async {
        let mut client = self.pool.get().await.map_err(map_pool_error)?;
        let tx = client
          .transaction()
          .await
          .map_err(|e| map_error(e, self.timeout))?;
        let mut results = Vec::with_capacity(statements.len());
        for statement in &statements {
          results.push(run(&*tx, statement, self.timeout).await?);
        }
        tx.commit().await.map_err(|e| map_error(e, self.timeout))?;
        Ok(results)
      })
      .await
  }
}
