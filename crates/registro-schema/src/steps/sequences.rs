//! PostgreSQL serial sequences can fall behind the ids in their table when
//! rows are copied or imported with explicit ids; the next insert then
//! fails on the primary key. SQLite tracks this itself.

use registro_core::{Dialect, Result, Statement, Store, Table};

use crate::rebuild::resync_sequence;

pub async fn satisfied<S: Store>(store: &S) -> Result<bool> {
  if store.dialect() == Dialect::Sqlite {
    return Ok(true);
  }
  for table in Table::DOMAIN {
    if lagging(store, table).await? {
      return Ok(false);
    }
  }
  Ok(true)
}

async fn lagging<S: Store>(store: &S, table: Table) -> Result<bool> {
  let result = store
    .execute(
      Statement::new(format!(
        "SELECT COALESCE((SELECT MAX(id) FROM {table}), 0)::int8 AS max_id,
                COALESCE((
                  SELECT s.last_value FROM pg_sequences s
                  WHERE s.schemaname = current_schema()
                    AND format('%I.%I', s.schemaname, s.sequencename)
                        = pg_get_serial_sequence($1, 'id')
                ), 0)::int8 AS last_value"
      ))
      .bind(table.as_str()),
    )
    .await?;
  let Some(row) = result.first() else {
    return Ok(false);
  };
  Ok(row.require_integer("last_value")? < row.require_integer("max_id")?)
}

pub async fn resync<S: Store>(store: &S) -> Result<()> {
  if store.dialect() == Dialect::Sqlite {
    return Ok(());
  }
  for table in Table::DOMAIN {
    if lagging(store, table).await? {
      store.execute(resync_sequence(table)).await?;
      tracing::info!(table = %table, "moved id sequence past existing rows");
    }
  }
  Ok(())
}
