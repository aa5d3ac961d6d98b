//! The ordered list of migration steps.
//!
//! Every step can tell from the live catalog whether its table already has
//! the target shape ([`Step::is_satisfied`]) and, if not, bring it there
//! ([`Step::apply`]) from any of the legacy shapes it knows. Applying a step
//! to a table already in shape changes nothing.

mod grades;
mod guardians;
mod payments;
mod sequences;
mod students;
mod teachers;

use registro_core::{
  Dialect, Result, Statement, Store, Table,
  dialect::{UniqueConstraint, UniqueOrigin, unique_constraint_name},
};
use serde::Serialize;

use crate::{
  catalog::{self, TableShape},
  identifiers::{CandidateSource, IdentifierGenerator},
  tables::{add_unique, create_table, plain_columns},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "&'static str")]
pub enum Step {
  AdministratorsCreate,
  GuardiansCreate,
  GuardiansNationalId,
  TeachersCreate,
  TeachersNationalId,
  StudentsCreate,
  StudentsBadge,
  StudentsGuardianRef,
  StudentsNationalIdNotUnique,
  StudentsRebuild,
  GradesCreate,
  GradesKind,
  GradesValueText,
  PaymentsCreate,
  PaymentsPeriod,
  SequencesResync,
}

impl Step {
  /// Every step, in the order it runs.
  pub const ALL: [Step; 16] = [
    Step::AdministratorsCreate,
    Step::GuardiansCreate,
    Step::GuardiansNationalId,
    Step::TeachersCreate,
    Step::TeachersNationalId,
    Step::StudentsCreate,
    Step::StudentsBadge,
    Step::StudentsGuardianRef,
    Step::StudentsNationalIdNotUnique,
    Step::StudentsRebuild,
    Step::GradesCreate,
    Step::GradesKind,
    Step::GradesValueText,
    Step::PaymentsCreate,
    Step::PaymentsPeriod,
    Step::SequencesResync,
  ];

  /// The key under which the step is recorded in the ledger.
  pub fn name(self) -> &'static str {
    match self {
      Self::AdministratorsCreate        => "0001_administradores_create",
      Self::GuardiansCreate             => "0002_representantes_create",
      Self::GuardiansNationalId         => "0003_representantes_cedula",
      Self::TeachersCreate              => "0004_maestros_create",
      Self::TeachersNationalId          => "0005_maestros_cedula",
      Self::StudentsCreate              => "0006_estudiantes_create",
      Self::StudentsBadge               => "0007_estudiantes_carnet",
      Self::StudentsGuardianRef         => "0008_estudiantes_cedula_representante",
      Self::StudentsNationalIdNotUnique => "0009_estudiantes_cedula_not_unique",
      Self::StudentsRebuild             => "0010_estudiantes_rebuild",
      Self::GradesCreate                => "0011_notas_create",
      Self::GradesKind                  => "0012_notas_tipo_calificacion",
      Self::GradesValueText             => "0013_notas_calificacion_text",
      Self::PaymentsCreate              => "0014_pagos_create",
      Self::PaymentsPeriod              => "0015_pagos_periodo",
      Self::SequencesResync             => "0016_sequences_resync",
    }
  }

  /// Steps that must have succeeded (in this run or an earlier one) for
  /// this one to be attempted.
  pub fn depends_on(self) -> &'static [Step] {
    use Step::*;
    match self {
      AdministratorsCreate | GuardiansCreate | TeachersCreate => &[],
      GuardiansNationalId => &[GuardiansCreate],
      TeachersNationalId => &[TeachersCreate],
      StudentsCreate => &[GuardiansNationalId],
      StudentsBadge => &[StudentsCreate],
      StudentsGuardianRef => &[GuardiansNationalId, StudentsCreate],
      StudentsNationalIdNotUnique => &[StudentsBadge, StudentsGuardianRef],
      StudentsRebuild => &[StudentsBadge, StudentsGuardianRef, StudentsNationalIdNotUnique],
      GradesCreate => &[StudentsCreate],
      GradesKind => &[GradesCreate],
      GradesValueText => &[GradesKind],
      PaymentsCreate => &[StudentsCreate],
      PaymentsPeriod => &[PaymentsCreate],
      SequencesResync => &[
        AdministratorsCreate,
        GuardiansCreate,
        TeachersCreate,
        StudentsCreate,
        GradesCreate,
        PaymentsCreate,
      ],
    }
  }

  pub async fn is_satisfied<S: Store>(self, store: &S) -> Result<bool> {
    use Step::*;
    match self {
      AdministratorsCreate => table_ready(store, Table::Administrators).await,
      GuardiansCreate => table_ready(store, Table::Guardians).await,
      GuardiansNationalId => guardians::national_id_satisfied(store).await,
      TeachersCreate => table_ready(store, Table::Teachers).await,
      TeachersNationalId => teachers::national_id_satisfied(store).await,
      StudentsCreate => table_ready(store, Table::Students).await,
      StudentsBadge => students::badge_satisfied(store).await,
      StudentsGuardianRef => students::guardian_ref_satisfied(store).await,
      StudentsNationalIdNotUnique => students::national_id_not_unique_satisfied(store).await,
      StudentsRebuild => students::rebuild_satisfied(store).await,
      GradesCreate => table_ready(store, Table::Grades).await,
      GradesKind => grades::kind_satisfied(store).await,
      GradesValueText => grades::value_text_satisfied(store).await,
      PaymentsCreate => table_ready(store, Table::Payments).await,
      PaymentsPeriod => payments::period_satisfied(store).await,
      SequencesResync => sequences::satisfied(store).await,
    }
  }

  pub async fn apply<S, C>(self, store: &S, ids: &IdentifierGenerator<C>) -> Result<()>
  where
    S: Store,
    C: CandidateSource,
  {
    use Step::*;
    match self {
      AdministratorsCreate => ensure_table(store, Table::Administrators).await,
      GuardiansCreate => ensure_table(store, Table::Guardians).await,
      GuardiansNationalId => guardians::national_id(store, ids).await,
      TeachersCreate => ensure_table(store, Table::Teachers).await,
      TeachersNationalId => teachers::national_id(store).await,
      StudentsCreate => ensure_table(store, Table::Students).await,
      StudentsBadge => students::badge(store, ids).await,
      StudentsGuardianRef => students::guardian_ref(store).await,
      StudentsNationalIdNotUnique => students::national_id_not_unique(store).await,
      StudentsRebuild => students::rebuild(store).await,
      GradesCreate => ensure_table(store, Table::Grades).await,
      GradesKind => grades::kind(store).await,
      GradesValueText => grades::value_text(store).await,
      PaymentsCreate => ensure_table(store, Table::Payments).await,
      PaymentsPeriod => payments::period(store).await,
      SequencesResync => sequences::resync(store).await,
    }
  }
}

impl From<Step> for &'static str {
  fn from(step: Step) -> Self { step.name() }
}

// ─── Shared helpers ──────────────────────────────────────────────────────────

async fn table_ready<S: Store>(store: &S, table: Table) -> Result<bool> {
  let shape = catalog::shape(store, table).await?;
  Ok(
    shape.exists()
      && plain_columns(store.dialect(), table)
        .iter()
        .all(|(column, _)| shape.has_column(column)),
  )
}

/// Create `table` in its current shape, or add the columns that need no
/// backfill to an existing one.
async fn ensure_table<S: Store>(store: &S, table: Table) -> Result<()> {
  let dialect = store.dialect();
  let shape = catalog::shape(store, table).await?;
  if !shape.exists() {
    store.execute(create_table(dialect, table, table.as_str())).await?;
    tracing::info!(table = %table, "created table");
    return Ok(());
  }

  for (column, ddl) in plain_columns(dialect, table) {
    if !shape.has_column(column) {
      add_column(store, table, column, &ddl).await?;
    }
  }
  Ok(())
}

async fn add_column<S: Store>(store: &S, table: Table, column: &str, ddl: &str) -> Result<()> {
  store
    .execute(Statement::new(format!("ALTER TABLE {table} ADD COLUMN {column} {ddl}")))
    .await?;
  tracing::info!(table = %table, column, "added column");
  Ok(())
}

/// Ids of the rows of `table` matching `filter`, in id order.
async fn ids_where<S: Store>(store: &S, table: Table, filter: &str) -> Result<Vec<i64>> {
  let result = store
    .execute(Statement::new(format!(
      "SELECT id FROM {table} WHERE {filter} ORDER BY id"
    )))
    .await?;
  result.rows.iter().map(|r| r.require_integer("id")).collect()
}

/// `ALTER TABLE <table> DROP CONSTRAINT` or `DROP INDEX`, for a unique read
/// back from the catalog.
fn drop_unique(dialect: Dialect, table: Table, unique: &UniqueConstraint) -> Statement {
  let name = dialect.quote_ident(&unique.name);
  match unique.origin {
    UniqueOrigin::Constraint => {
      Statement::new(format!("ALTER TABLE {table} DROP CONSTRAINT {name}"))
    }
    UniqueOrigin::Index => Statement::new(format!("DROP INDEX {name}")),
  }
}

/// Whether a unique violation on `table.column` can be told apart from one
/// on any other column. PostgreSQL reports the violated constraint by name,
/// so there the column must carry exactly one single-column unique, named
/// `<table>_<column>_key`. SQLite reports the column itself; any unique
/// will do, except a hand-made index under another name.
fn attributable_unique(dialect: Dialect, table: Table, shape: &TableShape, column: &str) -> bool {
  let canonical = unique_constraint_name(table, column);
  let mut uniques = shape.uniques.iter().filter(|u| u.covers_only(column)).peekable();
  match dialect {
    Dialect::Postgres => {
      matches!((uniques.next(), uniques.next()), (Some(u), None) if u.name == canonical)
    }
    Dialect::Sqlite => {
      uniques.peek().is_some()
        && uniques.all(|u| u.name == canonical || u.origin == UniqueOrigin::Constraint)
    }
  }
}

/// Bring the uniques on `table.column` to the state [`attributable_unique`]
/// accepts: rename or add the canonical one and drop the rest.
async fn ensure_attributable_unique<S: Store>(
  store: &S,
  table: Table,
  shape: &TableShape,
  column: &str,
) -> Result<()> {
  let dialect = store.dialect();
  let canonical = unique_constraint_name(table, column);
  let existing: Vec<&UniqueConstraint> =
    shape.uniques.iter().filter(|u| u.covers_only(column)).collect();

  let mut statements = Vec::new();
  match dialect {
    Dialect::Postgres => {
      let keep = existing
        .iter()
        .find(|u| u.name == canonical)
        .or_else(|| existing.first())
        .copied();
      match keep {
        None => statements.push(add_unique(dialect, table, column)),
        Some(unique) if unique.name != canonical => {
          statements.push(rename_unique(dialect, table, unique, &canonical));
        }
        Some(_) => {}
      }
      for unique in &existing {
        if keep.is_some_and(|k| k.name != unique.name) {
          statements.push(drop_unique(dialect, table, unique));
        }
      }
    }
    Dialect::Sqlite => {
      let covered = existing
        .iter()
        .any(|u| u.name == canonical || u.origin == UniqueOrigin::Constraint);
      for unique in &existing {
        if unique.origin == UniqueOrigin::Index && unique.name != canonical {
          statements.push(drop_unique(dialect, table, unique));
        }
      }
      if !covered {
        statements.push(add_unique(dialect, table, column));
      }
    }
  }

  if statements.is_empty() {
    return Ok(());
  }
  let replaced: Vec<&str> = existing
    .iter()
    .filter(|u| u.name != canonical)
    .map(|u| u.name.as_str())
    .collect();
  store.transaction(statements).await?;
  tracing::info!(
    table = %table,
    column,
    name = %canonical,
    replaced = ?replaced,
    "unique constraint in canonical form"
  );
  Ok(())
}

/// Give a unique read back from the catalog the name `name`.
fn rename_unique(dialect: Dialect, table: Table, unique: &UniqueConstraint, name: &str) -> Statement {
  let old = dialect.quote_ident(&unique.name);
  match unique.origin {
    UniqueOrigin::Constraint => {
      Statement::new(format!("ALTER TABLE {table} RENAME CONSTRAINT {old} TO {name}"))
    }
    UniqueOrigin::Index => Statement::new(format!("ALTER INDEX {old} RENAME TO {name}")),
  }
}

fn is_current_shape(table: Table, shape: &TableShape) -> bool {
  let current = crate::tables::current_columns(table);
  shape.missing(current).is_empty()
    && shape
      .columns
      .iter()
      .all(|c| current.iter().any(|k| k.eq_ignore_ascii_case(&c.name)))
}
