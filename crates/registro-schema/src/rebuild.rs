//! Rebuilding a table into its current shape when `ALTER TABLE` cannot get
//! it there: create `<t>_new`, copy rows, drop the old table, rename.
//!
//! On SQLite foreign-key enforcement is switched off around the swap (it
//! cannot change inside a transaction) and `PRAGMA foreign_key_check` runs
//! afterwards. On PostgreSQL the serial sequence and primary key keep their
//! conventional names and the sequence is moved past the copied ids.

use registro_core::{Dialect, Result, Statement, Store, Table};

use crate::{
  catalog::TableShape,
  tables::{create_table, current_columns},
};

/// How rows reach the rebuilt table.
pub enum RowCopy {
  /// `INSERT INTO <t>_new (target…) SELECT expr… FROM <t>`.
  Select(Vec<(&'static str, String)>),
  /// Pre-built inserts into `<t>_new`, for row-by-row transformations.
  Rows(Vec<Statement>),
}

impl RowCopy {
  /// Copy every current column the old table already has, unchanged.
  pub fn intersection(table: Table, old: &TableShape) -> Self {
    Self::Select(shared_columns(table, old))
  }
}

/// `(column, column)` pairs for every current column of `table` present in
/// `old`.
pub fn shared_columns(table: Table, old: &TableShape) -> Vec<(&'static str, String)> {
  current_columns(table)
    .iter()
    .filter(|c| old.has_column(c))
    .map(|c| (*c, (*c).to_owned()))
    .collect()
}

pub async fn rebuild<S: Store>(store: &S, table: Table, copy: RowCopy) -> Result<()> {
  let dialect = store.dialect();
  let scratch = table.rebuild_name();

  let mut statements = vec![
    Statement::new(format!("DROP TABLE IF EXISTS {scratch}")),
    create_table(dialect, table, &scratch),
  ];
  let copied = match copy {
    RowCopy::Select(columns) => {
      let targets: Vec<&str> = columns.iter().map(|(t, _)| *t).collect();
      let sources: Vec<&str> = columns.iter().map(|(_, e)| e.as_str()).collect();
      statements.push(Statement::new(format!(
        "INSERT INTO {scratch} ({}) SELECT {} FROM {table}",
        targets.join(", "),
        sources.join(", ")
      )));
      None
    }
    RowCopy::Rows(rows) => {
      let n = rows.len();
      statements.extend(rows);
      Some(n)
    }
  };
  statements.push(Statement::new(format!("DROP TABLE {table}")));
  statements.push(Statement::new(format!("ALTER TABLE {scratch} RENAME TO {table}")));

  if dialect == Dialect::Postgres {
    statements.push(Statement::new(format!(
      "ALTER SEQUENCE IF EXISTS {scratch}_id_seq RENAME TO {table}_id_seq"
    )));
    statements.push(Statement::new(format!(
      "ALTER TABLE {table} RENAME CONSTRAINT {scratch}_pkey TO {table}_pkey"
    )));
    statements.push(resync_sequence(table));
  }

  if dialect == Dialect::Sqlite {
    store.execute(Statement::new("PRAGMA foreign_keys = OFF")).await?;
  }
  let swapped = store.transaction(statements).await;
  if dialect == Dialect::Sqlite {
    store.execute(Statement::new("PRAGMA foreign_keys = ON")).await?;
  }
  swapped?;

  if dialect == Dialect::Sqlite {
    let dangling = store.execute(Statement::new("PRAGMA foreign_key_check")).await?;
    if !dangling.is_empty() {
      tracing::warn!(
        table = %table,
        rows = dangling.rows.len(),
        "rebuild left rows with dangling foreign keys"
      );
    }
  }

  tracing::info!(table = %table, rows = ?copied, "rebuilt table");
  Ok(())
}

/// Move the serial sequence of `table.id` to the largest id present, so the
/// next insert does not collide with a copied row.
pub fn resync_sequence(table: Table) -> Statement {
  Statement::new(format!(
    "SELECT setval(
       pg_get_serial_sequence('{table}', 'id'),
       COALESCE((SELECT MAX(id) FROM {table}), 1),
       (SELECT MAX(id) FROM {table}) IS NOT NULL
     )"
  ))
}
