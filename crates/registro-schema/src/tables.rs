//! Target DDL for every domain table, per dialect.
//!
//! Unique constraints are named `<table>_<column>_key` on both backends so a
//! violation can be attributed to its column. The DDL can be emitted under a
//! different table name for rebuilds; constraint names always follow the
//! logical table.

use registro_core::{Dialect, Statement, Table, dialect::unique_constraint_name};

/// Width of the `cedula`, `cedula_representante` and `carnet` columns.
pub const IDENTIFIER_WIDTH: i64 = 10;

/// Column names of the current shape of `table`.
pub fn current_columns(table: Table) -> &'static [&'static str] {
  match table {
    Table::Administrators => &["id", "nombre", "email", "password"],
    Table::Guardians      => &["id", "cedula", "nombre", "email", "password"],
    Table::Teachers => {
      &["id", "cedula", "nombre", "apellido", "email", "password", "grado_asignado"]
    }
    Table::Students => &[
      "id",
      "carnet",
      "nombre",
      "cedula",
      "fecha_nacimiento",
      "grado",
      "cedula_representante",
    ],
    Table::Grades => {
      &["id", "id_estudiante", "materia", "calificacion", "periodo", "tipo_calificacion"]
    }
    Table::Payments => &[
      "id",
      "id_estudiante",
      "monto",
      "mes",
      "anio_escolar",
      "estado",
      "fecha_vencimiento",
      "fecha_pago",
      "concepto",
    ],
    Table::Ledger => &["step", "applied_at"],
  }
}

/// Columns that may be added to an existing table with `ADD COLUMN` alone:
/// nullable, or carrying a default, with nothing to backfill.
pub fn plain_columns(dialect: Dialect, table: Table) -> Vec<(&'static str, String)> {
  match table {
    Table::Teachers => vec![
      ("apellido", "TEXT NOT NULL DEFAULT ''".to_owned()),
      ("grado_asignado", "TEXT".to_owned()),
    ],
    Table::Students => vec![
      ("cedula", "TEXT".to_owned()),
      ("fecha_nacimiento", dialect.date_type().to_owned()),
      ("grado", "TEXT".to_owned()),
    ],
    _ => Vec::new(),
  }
}

fn unique(table: Table, column: &str) -> String {
  format!("CONSTRAINT {} UNIQUE ({column})", unique_constraint_name(table, column))
}

/// `CREATE TABLE IF NOT EXISTS <name>` with the current shape of `table`.
pub fn create_table(dialect: Dialect, table: Table, name: &str) -> Statement {
  let pk = dialect.serial_primary_key();
  let date = dialect.date_type();
  let real = dialect.real_type();
  let w = IDENTIFIER_WIDTH;

  let body = match table {
    Table::Administrators => format!(
      "id {pk},
       nombre TEXT NOT NULL,
       email TEXT NOT NULL,
       password TEXT NOT NULL,
       {}",
      unique(table, "email")
    ),
    Table::Guardians => format!(
      "id {pk},
       cedula VARCHAR({w}) NOT NULL,
       nombre TEXT NOT NULL,
       email TEXT NOT NULL,
       password TEXT NOT NULL,
       {},
       {}",
      unique(table, "cedula"),
      unique(table, "email")
    ),
    Table::Teachers => format!(
      "id {pk},
       cedula VARCHAR({w}) NOT NULL,
       nombre TEXT NOT NULL,
       apellido TEXT NOT NULL DEFAULT '',
       email TEXT NOT NULL,
       password TEXT NOT NULL,
       grado_asignado TEXT,
       {},
       {}",
      unique(table, "cedula"),
      unique(table, "email")
    ),
    Table::Students => format!(
      "id {pk},
       carnet VARCHAR({w}) NOT NULL,
       nombre TEXT NOT NULL,
       cedula TEXT,
       fecha_nacimiento {date},
       grado TEXT,
       cedula_representante VARCHAR({w}) NOT NULL,
       {},
       CONSTRAINT estudiantes_cedula_representante_fkey
         FOREIGN KEY (cedula_representante) REFERENCES representantes (cedula)",
      unique(table, "carnet")
    ),
    Table::Grades => format!(
      "id {pk},
       id_estudiante INTEGER,
       materia TEXT NOT NULL,
       calificacion TEXT NOT NULL,
       periodo TEXT NOT NULL,
       tipo_calificacion TEXT NOT NULL DEFAULT 'numeric'
         CONSTRAINT notas_tipo_calificacion_check
         CHECK (tipo_calificacion IN ('numeric', 'letter')),
       CONSTRAINT notas_id_estudiante_fkey
         FOREIGN KEY (id_estudiante) REFERENCES estudiantes (id)"
    ),
    Table::Payments => format!(
      "id {pk},
       id_estudiante INTEGER NOT NULL,
       monto {real} NOT NULL,
       mes INTEGER NOT NULL CONSTRAINT pagos_mes_check CHECK (mes BETWEEN 1 AND 12),
       anio_escolar TEXT NOT NULL,
       estado TEXT NOT NULL DEFAULT 'pending'
         CONSTRAINT pagos_estado_check CHECK (estado IN ('paid', 'pending')),
       fecha_vencimiento {date},
       fecha_pago {date},
       concepto TEXT,
       CONSTRAINT pagos_id_estudiante_fkey
         FOREIGN KEY (id_estudiante) REFERENCES estudiantes (id),
       CONSTRAINT pagos_periodo_key UNIQUE (id_estudiante, mes, anio_escolar)"
    ),
    Table::Ledger => "step TEXT PRIMARY KEY, applied_at TEXT NOT NULL".to_owned(),
  };

  Statement::new(format!("CREATE TABLE IF NOT EXISTS {name} ({body})"))
}

/// Statement adding a single-column unique constraint, as a named constraint
/// on PostgreSQL and a named unique index on SQLite.
pub fn add_unique(dialect: Dialect, table: Table, column: &str) -> Statement {
  let name = unique_constraint_name(table, column);
  match dialect {
    Dialect::Postgres => {
      Statement::new(format!("ALTER TABLE {table} ADD CONSTRAINT {name} UNIQUE ({column})"))
    }
    Dialect::Sqlite => {
      Statement::new(format!("CREATE UNIQUE INDEX IF NOT EXISTS {name} ON {table} ({column})"))
    }
  }
}
