use registro_core::{Dialect, Result, Statement, Store, Table, ident::IdFamily};

use super::{add_column, attributable_unique, ensure_attributable_unique, ids_where};
use crate::{
  catalog,
  identifiers::{CandidateSource, IdentifierGenerator},
  rebuild::{RowCopy, rebuild},
  tables::IDENTIFIER_WIDTH,
};

pub async fn national_id_satisfied<S: Store>(store: &S) -> Result<bool> {
  let shape = catalog::shape(store, Table::Guardians).await?;
  Ok(
    shape.column("cedula").is_some_and(|c| !c.nullable)
      && shape.fits("cedula", IDENTIFIER_WIDTH)
      && attributable_unique(store.dialect(), Table::Guardians, &shape, "cedula"),
  )
}

/// Give every guardian a unique, non-null national ID at least
/// [`IDENTIFIER_WIDTH`] characters wide.
pub async fn national_id<S, C>(store: &S, ids: &IdentifierGenerator<C>) -> Result<()>
where
  S: Store,
  C: CandidateSource,
{
  let table = Table::Guardians;
  let dialect = store.dialect();
  let shape = catalog::shape(store, table).await?;

  if !shape.has_column("cedula") {
    add_column(store, table, "cedula", &format!("VARCHAR({IDENTIFIER_WIDTH})")).await?;
  } else {
    let blanked = store
      .execute(Statement::new("UPDATE representantes SET cedula = NULL WHERE cedula = ''"))
      .await?;
    if blanked.affected > 0 {
      tracing::info!(rows = blanked.affected, "cleared empty national IDs");
    }
  }

  ensure_attributable_unique(store, table, &shape, "cedula").await?;

  let missing = ids_where(store, table, "cedula IS NULL").await?;
  for id in &missing {
    ids.assign(store, IdFamily::GuardianNationalId, *id).await?;
  }
  if !missing.is_empty() {
    tracing::info!(rows = missing.len(), "backfilled guardian national IDs");
  }

  let shape = catalog::shape(store, table).await?;
  let narrow = !shape.fits("cedula", IDENTIFIER_WIDTH);
  let nullable = shape.column("cedula").is_some_and(|c| c.nullable);

  match dialect {
    Dialect::Postgres => {
      if narrow {
        widen_national_id(store).await?;
      }
      if nullable {
        store
          .execute(Statement::new(
            "ALTER TABLE representantes ALTER COLUMN cedula SET NOT NULL",
          ))
          .await?;
        tracing::info!(table = %table, column = "cedula", "set NOT NULL");
      }
    }
    Dialect::Sqlite => {
      if narrow || nullable {
        rebuild(store, table, RowCopy::intersection(table, &shape)).await?;
      }
    }
  }
  Ok(())
}

/// Widen `representantes.cedula` in place. Foreign keys from students that
/// reference it are dropped and recreated around the type change, inside
/// one transaction.
async fn widen_national_id<S: Store>(store: &S) -> Result<()> {
  let dialect = store.dialect();
  let students = catalog::shape(store, Table::Students).await?;
  let dependents: Vec<_> = students
    .foreign_keys
    .iter()
    .filter(|fk| {
      fk.ref_table == Table::Guardians.as_str() && fk.ref_column.as_deref() == Some("cedula")
    })
    .collect();

  let mut statements = Vec::new();
  for fk in &dependents {
    if let Some(name) = &fk.name {
      statements.push(Statement::new(format!(
        "ALTER TABLE estudiantes DROP CONSTRAINT {}",
        dialect.quote_ident(name)
      )));
    }
  }
  statements.push(Statement::new(format!(
    "ALTER TABLE representantes ALTER COLUMN cedula TYPE VARCHAR({IDENTIFIER_WIDTH})"
  )));
  if students.has_column("cedula_representante")
    && !students.fits("cedula_representante", IDENTIFIER_WIDTH)
  {
    statements.push(Statement::new(format!(
      "ALTER TABLE estudiantes ALTER COLUMN cedula_representante TYPE VARCHAR({IDENTIFIER_WIDTH})"
    )));
  }
  for fk in &dependents {
    if let Some(name) = &fk.name {
      statements.push(Statement::new(format!(
        "ALTER TABLE estudiantes ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES representantes (cedula)",
        dialect.quote_ident(name),
        dialect.quote_ident(&fk.column)
      )));
    }
  }

  store.transaction(statements).await?;
  tracing::info!(
    column = "representantes.cedula",
    width = IDENTIFIER_WIDTH,
    foreign_keys = dependents.len(),
    "widened national ID"
  );
  Ok(())
}
