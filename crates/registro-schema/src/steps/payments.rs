use std::collections::HashMap;

use registro_core::{
  Dialect, Error, Result, Statement, Store, Table, Value,
  entity::{decode_date, encode_date},
  period::{PaymentStatus, SchoolMonth, SchoolYear},
};

use crate::{
  catalog::{self, TableShape},
  rebuild::{RowCopy, rebuild},
  tables::current_columns,
};

const TABLE: Table = Table::Payments;
const PERIOD: [&str; 3] = ["id_estudiante", "mes", "anio_escolar"];

fn in_shape(shape: &TableShape) -> bool {
  shape.missing(current_columns(TABLE)).is_empty() && shape.unique_over(&PERIOD)
}

pub async fn period_satisfied<S: Store>(store: &S) -> Result<bool> {
  Ok(in_shape(&catalog::shape(store, TABLE).await?))
}

/// Move payments from the legacy `(monto, fecha, concepto)` shape to one
/// row per student, school month and school year.
pub async fn period<S: Store>(store: &S) -> Result<()> {
  let dialect = store.dialect();
  let shape = catalog::shape(store, TABLE).await?;

  if shape.has_column("fecha") && !shape.has_column("mes") {
    return transform_legacy(store).await;
  }

  let missing = shape.missing(current_columns(TABLE));
  if !missing.is_empty() {
    return Err(Error::InvalidValue(format!(
      "pagos has an unrecognised shape; missing {missing:?}"
    )));
  }

  if !shape.unique_over(&PERIOD) {
    let sql = match dialect {
      Dialect::Postgres => "ALTER TABLE pagos ADD CONSTRAINT pagos_periodo_key
                            UNIQUE (id_estudiante, mes, anio_escolar)",
      Dialect::Sqlite => "CREATE UNIQUE INDEX IF NOT EXISTS pagos_periodo_key
                          ON pagos (id_estudiante, mes, anio_escolar)",
    };
    store.execute(Statement::new(sql)).await?;
    tracing::info!(table = %TABLE, "added unique payment period");
  }
  Ok(())
}

/// Each legacy payment becomes a paid payment for the school month of its
/// date in the supported school year. Every row is checked before anything
/// is written; a student with two payments in one month aborts the step and
/// leaves the legacy table as it was.
async fn transform_legacy<S: Store>(store: &S) -> Result<()> {
  let dialect = store.dialect();
  let legacy = store
    .execute(Statement::new(format!(
      "SELECT id, id_estudiante, CAST(monto AS {real}) AS monto, CAST(fecha AS TEXT) AS fecha, concepto
       FROM pagos ORDER BY id",
      real = dialect.real_type()
    )))
    .await?;

  let year = SchoolYear::SUPPORTED.label();
  let mut periods: HashMap<(i64, u8), i64> = HashMap::new();
  let mut inserts = Vec::with_capacity(legacy.rows.len());

  for row in &legacy.rows {
    let id = row.require_integer("id")?;
    let student = row
      .integer("id_estudiante")?
      .ok_or_else(|| Error::InvalidValue(format!("payment {id} has no student")))?;
    let raw_date = row.text("fecha")?.unwrap_or_default();
    let date = decode_date(&raw_date)
      .ok_or_else(|| Error::InvalidValue(format!("payment {id} has unreadable date {raw_date:?}")))?;
    let month = SchoolMonth::from_date(date);

    if let Some(first) = periods.insert((student, month.number()), id) {
      return Err(Error::InvalidValue(format!(
        "payments {first} and {id} both fall in month {} for student {student}",
        month.number()
      )));
    }

    inserts.push(
      Statement::new(format!(
        "INSERT INTO {} (id, id_estudiante, monto, mes, anio_escolar, estado,
                         fecha_vencimiento, fecha_pago, concepto)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        TABLE.rebuild_name()
      ))
      .bind(id)
      .bind(student)
      .bind(row.real("monto")?.unwrap_or_default())
      .bind(month.number())
      .bind(year.as_str())
      .bind(PaymentStatus::Paid.as_str())
      .bind(Value::Null)
      .bind(encode_date(date))
      .bind(row.text("concepto")?),
    );
  }

  let rows = inserts.len();
  rebuild(store, TABLE, RowCopy::Rows(inserts)).await?;
  tracing::info!(table = %TABLE, rows, school_year = %year, "converted legacy payments");
  Ok(())
}
