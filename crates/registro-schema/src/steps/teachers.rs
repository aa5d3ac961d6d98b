use registro_core::{Dialect, Error, Result, Statement, Store, Table};

use super::{attributable_unique, ensure_attributable_unique};
use crate::{
  catalog,
  rebuild::{RowCopy, rebuild},
  tables::IDENTIFIER_WIDTH,
};

pub async fn national_id_satisfied<S: Store>(store: &S) -> Result<bool> {
  let shape = catalog::shape(store, Table::Teachers).await?;
  Ok(
    shape.column("cedula").is_some_and(|c| !c.nullable)
      && shape.fits("cedula", IDENTIFIER_WIDTH)
      && attributable_unique(store.dialect(), Table::Teachers, &shape, "cedula"),
  )
}

/// Widen `maestros.cedula` and make it unique and non-null. Teachers' IDs
/// are entered by hand, so nothing is generated here.
pub async fn national_id<S: Store>(store: &S) -> Result<()> {
  let table = Table::Teachers;
  let dialect = store.dialect();
  let shape = catalog::shape(store, table).await?;

  let Some(column) = shape.column("cedula") else {
    return Err(Error::InvalidValue(
      "maestros has no cedula column and teacher national IDs cannot be derived".to_owned(),
    ));
  };
  let narrow = !shape.fits("cedula", IDENTIFIER_WIDTH);
  let nullable = column.nullable;

  ensure_attributable_unique(store, table, &shape, "cedula").await?;

  match dialect {
    Dialect::Postgres => {
      if narrow {
        store
          .execute(Statement::new(format!(
            "ALTER TABLE maestros ALTER COLUMN cedula TYPE VARCHAR({IDENTIFIER_WIDTH})"
          )))
          .await?;
        tracing::info!(table = %table, column = "cedula", width = IDENTIFIER_WIDTH, "widened column");
      }
      if nullable {
        store
          .execute(Statement::new("ALTER TABLE maestros ALTER COLUMN cedula SET NOT NULL"))
          .await?;
        tracing::info!(table = %table, column = "cedula", "set NOT NULL");
      }
    }
    Dialect::Sqlite => {
      if narrow || nullable {
        let shape = catalog::shape(store, table).await?;
        rebuild(store, table, RowCopy::intersection(table, &shape)).await?;
      }
    }
  }
  Ok(())
}
