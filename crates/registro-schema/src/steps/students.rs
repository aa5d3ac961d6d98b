use std::collections::HashSet;

use registro_core::{
  Dialect, Error, Result, Statement, Store, Table,
  dialect::UniqueOrigin,
  ident::{IdFamily, is_badge_number},
};

use super::{
  add_column, attributable_unique, drop_unique, ensure_attributable_unique, ids_where,
  is_current_shape,
};
use crate::{
  catalog,
  identifiers::{CandidateSource, IdentifierGenerator},
  rebuild::{RowCopy, rebuild as rebuild_table},
  tables::IDENTIFIER_WIDTH,
};

const TABLE: Table = Table::Students;

// ─── Badge numbers ───────────────────────────────────────────────────────────

/// Rows whose badge must be regenerated: missing, in an older format, or a
/// repeat of a badge already held by a row with a lower id.
async fn stale_badges<S: Store>(store: &S) -> Result<Vec<i64>> {
  let result = store
    .execute(Statement::new("SELECT id, carnet FROM estudiantes ORDER BY id"))
    .await?;

  let mut seen = HashSet::new();
  let mut stale = Vec::new();
  for row in &result.rows {
    let id = row.require_integer("id")?;
    match row.text("carnet")? {
      Some(badge) if is_badge_number(&badge) && !seen.contains(&badge) => {
        seen.insert(badge);
      }
      _ => stale.push(id),
    }
  }
  Ok(stale)
}

pub async fn badge_satisfied<S: Store>(store: &S) -> Result<bool> {
  let shape = catalog::shape(store, TABLE).await?;
  let Some(column) = shape.column("carnet") else {
    return Ok(false);
  };
  if !attributable_unique(store.dialect(), TABLE, &shape, "carnet") {
    return Ok(false);
  }
  // SQLite gains NOT NULL in the rebuild step.
  if store.dialect() == Dialect::Postgres && column.nullable {
    return Ok(false);
  }
  Ok(stale_badges(store).await?.is_empty())
}

/// Give every student a unique badge in the current format. Badges already
/// in format are left alone.
pub async fn badge<S, C>(store: &S, ids: &IdentifierGenerator<C>) -> Result<()>
where
  S: Store,
  C: CandidateSource,
{
  let dialect = store.dialect();
  let shape = catalog::shape(store, TABLE).await?;

  if !shape.has_column("carnet") {
    add_column(store, TABLE, "carnet", &format!("VARCHAR({IDENTIFIER_WIDTH})")).await?;
  }

  let stale = stale_badges(store).await?;
  if shape.unique_on("carnet").is_none() && !stale.is_empty() {
    // Clear the badges about to be replaced so duplicates do not block the
    // constraint; the constraint then arbitrates the replacements.
    let clear = stale
      .iter()
      .map(|id| Statement::new("UPDATE estudiantes SET carnet = NULL WHERE id = $1").bind(*id))
      .collect();
    store.transaction(clear).await?;
  }
  ensure_attributable_unique(store, TABLE, &shape, "carnet").await?;

  for id in &stale {
    ids.assign(store, IdFamily::StudentBadge, *id).await?;
  }
  if !stale.is_empty() {
    tracing::info!(rows = stale.len(), "regenerated student badges");
  }

  if dialect == Dialect::Postgres && shape.column("carnet").is_none_or(|c| c.nullable) {
    store
      .execute(Statement::new("ALTER TABLE estudiantes ALTER COLUMN carnet SET NOT NULL"))
      .await?;
    tracing::info!(table = %TABLE, column = "carnet", "set NOT NULL");
  }
  Ok(())
}

// ─── Guardian reference ──────────────────────────────────────────────────────

pub async fn guardian_ref_satisfied<S: Store>(store: &S) -> Result<bool> {
  let shape = catalog::shape(store, TABLE).await?;
  let Some(column) = shape.column("cedula_representante") else {
    return Ok(false);
  };
  if shape.foreign_key_on("cedula_representante").is_none() {
    return Ok(false);
  }
  if store.dialect() == Dialect::Postgres
    && (column.nullable
      || shape.has_column("id_representante")
      || !shape.fits("cedula_representante", IDENTIFIER_WIDTH))
  {
    return Ok(false);
  }
  Ok(ids_where(store, TABLE, "cedula_representante IS NULL").await?.is_empty())
}

/// Replace the integer guardian relation with the guardian's national ID.
/// The new column is populated through the old relation before anything is
/// dropped.
pub async fn guardian_ref<S: Store>(store: &S) -> Result<()> {
  let dialect = store.dialect();
  let shape = catalog::shape(store, TABLE).await?;
  let legacy = shape.has_column("id_representante");

  if !shape.has_column("cedula_representante") {
    let ddl = match dialect {
      Dialect::Postgres => format!("VARCHAR({IDENTIFIER_WIDTH})"),
      Dialect::Sqlite => format!("VARCHAR({IDENTIFIER_WIDTH}) REFERENCES representantes (cedula)"),
    };
    add_column(store, TABLE, "cedula_representante", &ddl).await?;
  }

  if legacy {
    let populated = store
      .execute(Statement::new(
        "UPDATE estudiantes
         SET cedula_representante = (
           SELECT r.cedula FROM representantes r WHERE r.id = estudiantes.id_representante
         )
         WHERE cedula_representante IS NULL",
      ))
      .await?;
    tracing::info!(rows = populated.affected, "populated guardian national ID on students");
  }

  let orphans = ids_where(store, TABLE, "cedula_representante IS NULL").await?;
  if !orphans.is_empty() {
    return Err(Error::InvalidValue(format!(
      "{} students have no resolvable guardian (ids {orphans:?})",
      orphans.len()
    )));
  }

  if dialect == Dialect::Postgres {
    let mut statements = Vec::new();
    if legacy {
      statements.push(Statement::new("ALTER TABLE estudiantes DROP COLUMN id_representante"));
    }
    if shape.has_column("cedula_representante")
      && !shape.fits("cedula_representante", IDENTIFIER_WIDTH)
    {
      statements.push(Statement::new(format!(
        "ALTER TABLE estudiantes ALTER COLUMN cedula_representante TYPE VARCHAR({IDENTIFIER_WIDTH})"
      )));
    }
    if shape.foreign_key_on("cedula_representante").is_none() {
      statements.push(Statement::new(
        "ALTER TABLE estudiantes ADD CONSTRAINT estudiantes_cedula_representante_fkey
         FOREIGN KEY (cedula_representante) REFERENCES representantes (cedula)",
      ));
    }
    statements.push(Statement::new(
      "ALTER TABLE estudiantes ALTER COLUMN cedula_representante SET NOT NULL",
    ));
    store.transaction(statements).await?;
    tracing::info!(table = %TABLE, dropped_legacy = legacy, "guardian reference now by national ID");
  }
  Ok(())
}

// ─── Student national ID ─────────────────────────────────────────────────────

pub async fn national_id_not_unique_satisfied<S: Store>(store: &S) -> Result<bool> {
  let shape = catalog::shape(store, TABLE).await?;
  Ok(shape.unique_on("cedula").is_none())
}

/// Siblings may share a national ID, and many students have none.
pub async fn national_id_not_unique<S: Store>(store: &S) -> Result<()> {
  let dialect = store.dialect();
  let shape = catalog::shape(store, TABLE).await?;

  let mut needs_rebuild = false;
  for unique in shape.uniques.iter().filter(|u| u.covers_only("cedula")) {
    match (dialect, unique.origin) {
      (Dialect::Sqlite, UniqueOrigin::Constraint) => needs_rebuild = true,
      _ => {
        store.execute(drop_unique(dialect, TABLE, unique)).await?;
        tracing::info!(table = %TABLE, name = %unique.name, "dropped unique on student national ID");
      }
    }
  }

  if needs_rebuild {
    rebuild_table(store, TABLE, RowCopy::intersection(TABLE, &shape)).await?;
  }
  Ok(())
}

// ─── Rebuild ─────────────────────────────────────────────────────────────────

/// PostgreSQL reaches the target shape in place; only SQLite needs this.
pub async fn rebuild_satisfied<S: Store>(store: &S) -> Result<bool> {
  if store.dialect() == Dialect::Postgres {
    return Ok(true);
  }
  let shape = catalog::shape(store, TABLE).await?;
  let not_null = |name: &str| shape.column(name).is_some_and(|c| !c.nullable);
  Ok(
    is_current_shape(TABLE, &shape)
      && not_null("carnet")
      && not_null("cedula_representante")
      && shape.foreign_key_on("cedula_representante").is_some()
      && shape.unique_on("carnet").is_some()
      && shape.fits("carnet", IDENTIFIER_WIDTH)
      && shape.fits("cedula_representante", IDENTIFIER_WIDTH),
  )
}

/// Rebuild `estudiantes` on SQLite, dropping legacy columns and applying
/// NOT NULL to the identifier and guardian columns.
pub async fn rebuild<S: Store>(store: &S) -> Result<()> {
  if store.dialect() == Dialect::Postgres {
    return Ok(());
  }
  let shape = catalog::shape(store, TABLE).await?;
  rebuild_table(store, TABLE, RowCopy::intersection(TABLE, &shape)).await
}
