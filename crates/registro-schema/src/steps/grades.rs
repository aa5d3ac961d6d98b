use registro_core::{Dialect, Result, Statement, Store, Table, period::GradeKind};

use super::add_column;
use crate::{
  catalog,
  rebuild::{RowCopy, rebuild, shared_columns},
};

const TABLE: Table = Table::Grades;

pub async fn kind_satisfied<S: Store>(store: &S) -> Result<bool> {
  Ok(catalog::shape(store, TABLE).await?.has_column("tipo_calificacion"))
}

/// Add the grade kind and classify the grades already recorded.
pub async fn kind<S: Store>(store: &S) -> Result<()> {
  let shape = catalog::shape(store, TABLE).await?;
  if !shape.has_column("tipo_calificacion") {
    add_column(
      store,
      TABLE,
      "tipo_calificacion",
      "TEXT NOT NULL DEFAULT 'numeric' CHECK (tipo_calificacion IN ('numeric', 'letter'))",
    )
    .await?;
  }

  let grades = store
    .execute(Statement::new("SELECT id, calificacion FROM notas ORDER BY id"))
    .await?;
  let mut letters = Vec::new();
  for row in &grades.rows {
    let value = row.text("calificacion")?.unwrap_or_default();
    if GradeKind::classify(&value) == GradeKind::Letter {
      letters.push(
        Statement::new("UPDATE notas SET tipo_calificacion = $1 WHERE id = $2")
          .bind(GradeKind::Letter.as_str())
          .bind(row.require_integer("id")?),
      );
    }
  }

  let classified = grades.rows.len();
  let lettered = letters.len();
  if !letters.is_empty() {
    store.transaction(letters).await?;
  }
  tracing::info!(rows = classified, letters = lettered, "classified grade kinds");
  Ok(())
}

pub async fn value_text_satisfied<S: Store>(store: &S) -> Result<bool> {
  let shape = catalog::shape(store, TABLE).await?;
  Ok(shape.column("calificacion").is_some_and(|c| c.is_textual()))
}

/// Store grade values as text so letter grades fit. Whole numbers lose
/// their fractional part in the rendering (`18.0` becomes `"18"`).
pub async fn value_text<S: Store>(store: &S) -> Result<()> {
  match store.dialect() {
    Dialect::Postgres => {
      store
        .execute(Statement::new(
          "ALTER TABLE notas ALTER COLUMN calificacion TYPE TEXT USING (
             CASE WHEN calificacion = trunc(calificacion)
                  THEN trunc(calificacion)::bigint::text
                  ELSE calificacion::text
             END
           )",
        ))
        .await?;
    }
    Dialect::Sqlite => {
      let shape = catalog::shape(store, TABLE).await?;
      let mut columns = shared_columns(TABLE, &shape);
      for (target, expr) in &mut columns {
        if *target == "calificacion" {
          *expr = "CASE WHEN typeof(calificacion) = 'real'
                         AND calificacion = CAST(calificacion AS INTEGER)
                    THEN CAST(CAST(calificacion AS INTEGER) AS TEXT)
                    ELSE CAST(calificacion AS TEXT)
                   END"
            .to_owned();
        }
      }
      rebuild(store, TABLE, RowCopy::Select(columns)).await?;
    }
  }
  tracing::info!(table = %TABLE, column = "calificacion", "grade values now stored as text");
  Ok(())
}
