//! The syntactic and catalog differences between the supported backends.
//!
//! [`Dialect`] is pure: it builds statements and interprets errors and
//! catalog rows, but never talks to a database itself.

use std::{borrow::Cow, fmt};

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  error::DatabaseError,
  value::{QueryResult, Statement},
};

/// SQLite extended result codes reported for unique violations.
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";
const SQLITE_CONSTRAINT_PRIMARYKEY: &str = "1555";
/// PostgreSQL `unique_violation`.
const PG_UNIQUE_VIOLATION: &str = "23505";

// ─── Tables ──────────────────────────────────────────────────────────────────

/// Every table this layer may name in interpolated SQL.
///
/// Catalog helpers accept a [`Table`] rather than a string so that table names
/// spliced into statements always come from this fixed list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
  Administrators,
  Guardians,
  Teachers,
  Students,
  Grades,
  Payments,
  Ledger,
}

impl Table {
  pub const DOMAIN: [Table; 6] = [
    Table::Administrators,
    Table::Guardians,
    Table::Teachers,
    Table::Students,
    Table::Grades,
    Table::Payments,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Administrators => "administradores",
      Self::Guardians      => "representantes",
      Self::Teachers       => "maestros",
      Self::Students       => "estudiantes",
      Self::Grades         => "notas",
      Self::Payments       => "pagos",
      Self::Ledger         => "_schema_migrations",
    }
  }

  /// Name of the scratch table used while rebuilding this one.
  pub fn rebuild_name(self) -> String { format!("{}_new", self.as_str()) }
}

impl fmt::Display for Table {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

// ─── Catalog rows ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
  pub name:       String,
  /// Backend-native type name, lower-cased (`character varying`, `varchar(8)`).
  pub data_type:  String,
  pub max_length: Option<i64>,
  pub nullable:   bool,
}

impl ColumnInfo {
  /// Whether the column stores text under either backend's naming.
  pub fn is_textual(&self) -> bool {
    let t = self.data_type.as_str();
    t.contains("char") || t.contains("text") || t.contains("clob")
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UniqueOrigin {
  /// Declared as a table or column constraint.
  Constraint,
  /// Created with `CREATE UNIQUE INDEX`; droppable with `DROP INDEX`.
  Index,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UniqueConstraint {
  pub name:    String,
  pub columns: Vec<String>,
  pub origin:  UniqueOrigin,
}

impl UniqueConstraint {
  pub fn covers_only(&self, column: &str) -> bool {
    self.columns.len() == 1 && self.columns[0].eq_ignore_ascii_case(column)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
  /// SQLite does not name foreign keys.
  pub name:       Option<String>,
  pub column:     String,
  pub ref_table:  String,
  pub ref_column: Option<String>,
}

// ─── Dialect ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
  Postgres,
  Sqlite,
}

impl Dialect {
  pub fn name(self) -> &'static str {
    match self {
      Self::Postgres => "postgres",
      Self::Sqlite   => "sqlite",
    }
  }

  /// Positional marker for the 1-based parameter `index`.
  pub fn placeholder(self, index: usize) -> String {
    match self {
      Self::Postgres => format!("${index}"),
      Self::Sqlite   => format!("?{index}"),
    }
  }

  /// Rewrite the `$N` markers of a logical statement into this dialect's
  /// placeholder syntax. Quoted literals and identifiers are left alone.
  pub fn translate(self, sql: &str) -> Cow<'_, str> {
    if self == Self::Postgres || !sql.contains('$') {
      return Cow::Borrowed(sql);
    }

    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
      match quote {
        Some(q) => {
          out.push(c);
          if c == q {
            quote = None;
          }
        }
        None if c == '\'' || c == '"' => {
          quote = Some(c);
          out.push(c);
        }
        None if c == '$' && chars.peek().is_some_and(char::is_ascii_digit) => {
          out.push('?');
        }
        None => out.push(c),
      }
    }

    Cow::Owned(out)
  }

  /// Quote an identifier read back from the catalog.
  pub fn quote_ident(self, name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
  }

  // ── Errors ────────────────────────────────────────────────────────────────

  pub fn is_unique_violation(self, err: &DatabaseError) -> bool {
    match (self, err.code.as_deref()) {
      (Self::Postgres, Some(code)) => code == PG_UNIQUE_VIOLATION,
      (Self::Sqlite, Some(code)) => {
        code == SQLITE_CONSTRAINT_UNIQUE || code == SQLITE_CONSTRAINT_PRIMARYKEY
      }
      _ => false,
    }
  }

  /// Whether `err` is a unique violation on exactly `table.column`.
  ///
  /// PostgreSQL reports the constraint name, which this layer always sets to
  /// `<table>_<column>_key`. SQLite names the offending columns in the
  /// message instead (`UNIQUE constraint failed: estudiantes.carnet`).
  pub fn unique_violation_on(self, err: &DatabaseError, table: Table, column: &str) -> bool {
    if !self.is_unique_violation(err) {
      return false;
    }
    match self {
      Self::Postgres => {
        err.constraint.as_deref() == Some(unique_constraint_name(table, column).as_str())
      }
      Self::Sqlite => {
        let needle = format!("{}.{column}", table.as_str());
        err
          .message
          .rsplit(':')
          .next()
          .is_some_and(|cols| cols.split(',').map(str::trim).any(|c| c == needle))
      }
    }
  }

  // ── DDL vocabulary ────────────────────────────────────────────────────────

  pub fn serial_primary_key(self) -> &'static str {
    match self {
      Self::Postgres => "SERIAL PRIMARY KEY",
      Self::Sqlite   => "INTEGER PRIMARY KEY AUTOINCREMENT",
    }
  }

  pub fn date_type(self) -> &'static str {
    match self {
      Self::Postgres => "DATE",
      Self::Sqlite   => "TEXT",
    }
  }

  pub fn real_type(self) -> &'static str {
    match self {
      Self::Postgres => "DOUBLE PRECISION",
      Self::Sqlite   => "REAL",
    }
  }

  /// Whether `ALTER TABLE` can change a column's type, nullability or
  /// constraints in place. SQLite needs a table rebuild for all of these.
  pub fn alters_in_place(self) -> bool { self == Self::Postgres }

  // ── Catalog introspection ─────────────────────────────────────────────────

  /// Yields one row if `table` exists in the current schema.
  pub fn catalog_has_table(self, table: Table) -> Statement {
    match self {
      Self::Postgres => Statement::raw(
        "SELECT 1 AS present
         FROM information_schema.tables
         WHERE table_schema = current_schema() AND table_name::text = $1",
      ),
      Self::Sqlite => Statement::raw(
        "SELECT 1 AS present FROM sqlite_master WHERE type = 'table' AND name = ?1",
      ),
    }
    .bind(table.as_str())
  }

  /// Yields `name`, `data_type`, `max_length`, `nullable` per column.
  pub fn catalog_columns(self, table: Table) -> Statement {
    match self {
      Self::Postgres => Statement::raw(
        "SELECT column_name::text AS name,
                data_type::text AS data_type,
                character_maximum_length::int8 AS max_length,
                CASE WHEN is_nullable::text = 'YES' THEN 1 ELSE 0 END::int8 AS nullable
         FROM information_schema.columns
         WHERE table_schema = current_schema() AND table_name::text = $1
         ORDER BY ordinal_position",
      ),
      Self::Sqlite => Statement::raw(
        "SELECT name,
                type AS data_type,
                NULL AS max_length,
                CASE WHEN \"notnull\" = 0 AND pk = 0 THEN 1 ELSE 0 END AS nullable
         FROM pragma_table_info(?1)
         ORDER BY cid",
      ),
    }
    .bind(table.as_str())
  }

  /// Yields `name`, `column_name`, `origin` per column of every unique
  /// constraint or unique index, primary keys excluded.
  pub fn catalog_unique_constraints(self, table: Table) -> Statement {
    match self {
      Self::Postgres => Statement::raw(
        "SELECT i.relname::text AS name,
                a.attname::text AS column_name,
                CASE WHEN c.oid IS NULL THEN 'index' ELSE 'constraint' END AS origin
         FROM pg_index x
         JOIN pg_class t ON t.oid = x.indrelid
         JOIN pg_class i ON i.oid = x.indexrelid
         JOIN pg_namespace n ON n.oid = t.relnamespace
         JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY (x.indkey)
         LEFT JOIN pg_constraint c ON c.conindid = x.indexrelid AND c.contype = 'u'
         WHERE x.indisunique AND NOT x.indisprimary
           AND n.nspname = current_schema() AND t.relname::text = $1
         ORDER BY i.relname, array_position(x.indkey::int2[], a.attnum)",
      ),
      Self::Sqlite => Statement::raw(
        "SELECT il.name AS name,
                ii.name AS column_name,
                CASE il.origin WHEN 'c' THEN 'index' ELSE 'constraint' END AS origin
         FROM pragma_index_list(?1) AS il, pragma_index_info(il.name) AS ii
         WHERE il.\"unique\" = 1 AND il.origin <> 'pk'
         ORDER BY il.name, ii.seqno",
      ),
    }
    .bind(table.as_str())
  }

  /// Yields `name`, `column_name`, `ref_table`, `ref_column` per foreign key.
  pub fn catalog_foreign_keys(self, table: Table) -> Statement {
    match self {
      Self::Postgres => Statement::raw(
        "SELECT con.conname::text AS name,
                a.attname::text AS column_name,
                rt.relname::text AS ref_table,
                ra.attname::text AS ref_column
         FROM pg_constraint con
         JOIN pg_class t ON t.oid = con.conrelid
         JOIN pg_namespace n ON n.oid = t.relnamespace
         JOIN pg_class rt ON rt.oid = con.confrelid
         JOIN pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = con.conkey[1]
         JOIN pg_attribute ra ON ra.attrelid = con.confrelid AND ra.attnum = con.confkey[1]
         WHERE con.contype = 'f'
           AND n.nspname = current_schema() AND t.relname::text = $1",
      ),
      Self::Sqlite => Statement::raw(
        "SELECT NULL AS name,
                \"from\" AS column_name,
                \"table\" AS ref_table,
                \"to\" AS ref_column
         FROM pragma_foreign_key_list(?1)",
      ),
    }
    .bind(table.as_str())
  }
}

impl fmt::Display for Dialect {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

/// The name given to the single-column unique constraint on `table.column`.
pub fn unique_constraint_name(table: Table, column: &str) -> String {
  format!("{}_{column}_key", table.as_str())
}

// ─── Catalog row parsing ─────────────────────────────────────────────────────

pub fn parse_columns(result: &QueryResult) -> Result<Vec<ColumnInfo>> {
  result
    .rows
    .iter()
    .map(|row| {
      let data_type = row.require_text("data_type")?.to_ascii_lowercase();
      let max_length = match row.integer("max_length")? {
        Some(n) => Some(n),
        None => declared_length(&data_type),
      };
      Ok(ColumnInfo {
        name: row.require_text("name")?,
        data_type,
        max_length,
        nullable: row.require_integer("nullable")? != 0,
      })
    })
    .collect()
}

pub fn parse_unique_constraints(result: &QueryResult) -> Result<Vec<UniqueConstraint>> {
  let mut out: Vec<UniqueConstraint> = Vec::new();
  for row in &result.rows {
    let name = row.require_text("name")?;
    let column = row.require_text("column_name")?;
    let origin = match row.require_text("origin")?.as_str() {
      "index" => UniqueOrigin::Index,
      _ => UniqueOrigin::Constraint,
    };
    match out.last_mut() {
      Some(last) if last.name == name => last.columns.push(column),
      _ => out.push(UniqueConstraint { name, columns: vec![column], origin }),
    }
  }
  Ok(out)
}

pub fn parse_foreign_keys(result: &QueryResult) -> Result<Vec<ForeignKey>> {
  result
    .rows
    .iter()
    .map(|row| {
      Ok(ForeignKey {
        name:       row.text("name")?,
        column:     row.require_text("column_name")?,
        ref_table:  row.require_text("ref_table")?,
        ref_column: row.text("ref_column")?,
      })
    })
    .collect()
}

/// `varchar(8)` → `Some(8)`.
fn declared_length(data_type: &str) -> Option<i64> {
  let open = data_type.find('(')?;
  let close = data_type[open..].find(')')? + open;
  data_type[open + 1..close].trim().parse().ok()
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::value::{Row, Value};

  fn result(columns: &[&str], rows: Vec<Vec<Value>>) -> QueryResult {
    let columns: Arc<[String]> = columns.iter().map(|c| (*c).to_owned()).collect();
    let rows: Vec<Row> = rows.into_iter().map(|v| Row::new(columns.clone(), v)).collect();
    QueryResult { affected: rows.len() as u64, rows }
  }

  fn db_error(backend: Dialect, code: &str, constraint: Option<&str>, message: &str) -> DatabaseError {
    DatabaseError {
      backend,
      code: Some(code.to_owned()),
      constraint: constraint.map(str::to_owned),
      message: message.to_owned(),
    }
  }

  #[test]
  fn placeholders_per_dialect() {
    assert_eq!(Dialect::Postgres.placeholder(3), "$3");
    assert_eq!(Dialect::Sqlite.placeholder(3), "?3");
  }

  #[test]
  fn translate_skips_quoted_text() {
    let sql = "SELECT '$1' AS lit, \"$2\" FROM t WHERE a = $1 AND b = $12";
    assert_eq!(
      Dialect::Sqlite.translate(sql),
      "SELECT '$1' AS lit, \"$2\" FROM t WHERE a = ?1 AND b = ?12"
    );
    assert_eq!(Dialect::Postgres.translate(sql), sql);
  }

  #[test]
  fn translate_leaves_lone_dollar_signs() {
    assert_eq!(Dialect::Sqlite.translate("SELECT 'US$' || $1"), "SELECT 'US$' || ?1");
    assert_eq!(Dialect::Sqlite.translate("SELECT a$b"), "SELECT a$b");
  }

  #[test]
  fn unique_violation_codes() {
    let pg = db_error(Dialect::Postgres, "23505", Some("estudiantes_carnet_key"), "duplicate key");
    assert!(Dialect::Postgres.is_unique_violation(&pg));
    let fk = db_error(Dialect::Postgres, "23503", None, "fk");
    assert!(!Dialect::Postgres.is_unique_violation(&fk));

    let lite = db_error(Dialect::Sqlite, "2067", None, "UNIQUE constraint failed: estudiantes.carnet");
    assert!(Dialect::Sqlite.is_unique_violation(&lite));
    let notnull = db_error(Dialect::Sqlite, "1299", None, "NOT NULL constraint failed: x.y");
    assert!(!Dialect::Sqlite.is_unique_violation(&notnull));
  }

  #[test]
  fn unique_violation_is_attributed_to_a_column() {
    let pg = db_error(Dialect::Postgres, "23505", Some("estudiantes_carnet_key"), "duplicate key");
    assert!(Dialect::Postgres.unique_violation_on(&pg, Table::Students, "carnet"));
    assert!(!Dialect::Postgres.unique_violation_on(&pg, Table::Guardians, "cedula"));

    let lite = db_error(
      Dialect::Sqlite,
      "2067",
      None,
      "UNIQUE constraint failed: representantes.email",
    );
    assert!(Dialect::Sqlite.unique_violation_on(&lite, Table::Guardians, "email"));
    assert!(!Dialect::Sqlite.unique_violation_on(&lite, Table::Guardians, "cedula"));
  }

  #[test]
  fn catalog_statements_bind_the_table_name() {
    for dialect in [Dialect::Postgres, Dialect::Sqlite] {
      let s = dialect.catalog_columns(Table::Guardians);
      assert!(!s.is_logical());
      assert_eq!(s.params, vec![Value::Text("representantes".into())]);
    }
  }

  #[test]
  fn unique_columns_follow_index_key_order() {
    let sql = Dialect::Postgres.catalog_unique_constraints(Table::Payments).sql;
    assert!(sql.contains("ORDER BY i.relname, array_position(x.indkey::int2[], a.attnum)"));

    let lite = Dialect::Sqlite.catalog_unique_constraints(Table::Payments).sql;
    assert!(lite.contains("ORDER BY il.name, ii.seqno"));
  }

  #[test]
  fn columns_parse_declared_lengths() {
    let r = result(
      &["name", "data_type", "max_length", "nullable"],
      vec![
        vec!["cedula".into(), "VARCHAR(8)".into(), Value::Null, Value::Integer(0)],
        vec!["nombre".into(), "TEXT".into(), Value::Null, Value::Integer(1)],
        vec!["email".into(), "character varying".into(), Value::Integer(120), Value::Integer(1)],
      ],
    );
    let cols = parse_columns(&r).unwrap();
    assert_eq!(cols[0].max_length, Some(8));
    assert!(!cols[0].nullable);
    assert_eq!(cols[1].max_length, None);
    assert!(cols[1].is_textual());
    assert_eq!(cols[2].max_length, Some(120));
  }

  #[test]
  fn unique_rows_group_by_name() {
    let r = result(
      &["name", "column_name", "origin"],
      vec![
        vec!["pagos_periodo_key".into(), "id_estudiante".into(), "constraint".into()],
        vec!["pagos_periodo_key".into(), "mes".into(), "constraint".into()],
        vec!["pagos_periodo_key".into(), "anio_escolar".into(), "constraint".into()],
        vec!["estudiantes_cedula_key".into(), "cedula".into(), "index".into()],
      ],
    );
    let uniques = parse_unique_constraints(&r).unwrap();
    assert_eq!(uniques.len(), 2);
    assert_eq!(uniques[0].columns, ["id_estudiante", "mes", "anio_escolar"]);
    assert!(uniques[1].covers_only("cedula"));
    assert_eq!(uniques[1].origin, UniqueOrigin::Index);
  }
}
