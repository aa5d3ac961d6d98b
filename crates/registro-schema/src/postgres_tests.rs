//! Migration tests against a live PostgreSQL server, seeded with the legacy
//! table shapes found in deployed databases.
//!
//! Skipped unless `REGISTRO_TEST_DATABASE_URL` is set. Each test works in its
//! own schema, dropped and recreated on entry, over a single pooled
//! connection so the session `search_path` holds for every statement.

use std::collections::HashSet;

use registro_core::{
  Error, Statement, Store, Table,
  dialect::UniqueOrigin,
  entity::{NewGuardian, NewPayment},
  ident::{is_badge_number, is_national_id},
  period::{PaymentStatus, SchoolMonth},
};
use registro_store_postgres::{PostgresSettings, PostgresStore};

use crate::{
  IdentifierGenerator, catalog, records,
  steps::Step,
  tests::{column_values, exec_all, migrate, scripted, settled_state, uniques_on},
};

async fn store(schema: &str) -> Option<PostgresStore> {
  let Ok(url) = std::env::var("REGISTRO_TEST_DATABASE_URL") else {
    return None;
  };
  let settings = PostgresSettings { pool_max_size: 1, ..PostgresSettings::default() };
  let store = PostgresStore::connect(&url, settings).await.unwrap();
  for sql in [
    format!("DROP SCHEMA IF EXISTS {schema} CASCADE"),
    format!("CREATE SCHEMA {schema}"),
    format!("SET search_path TO {schema}"),
  ] {
    store.execute(Statement::raw(sql)).await.unwrap();
  }
  Some(store)
}

async fn legacy_students(s: &PostgresStore) {
  exec_all(s, &[
    "CREATE TABLE representantes (
       id SERIAL PRIMARY KEY,
       cedula VARCHAR(8) UNIQUE,
       nombre TEXT NOT NULL,
       email TEXT NOT NULL UNIQUE,
       password TEXT NOT NULL
     )",
    "INSERT INTO representantes (cedula, nombre, email, password) VALUES ('12345678', 'Ana', 'ana@x.com', 'h')",
    "INSERT INTO representantes (cedula, nombre, email, password) VALUES ('', 'Beto', 'beto@x.com', 'h')",
    "CREATE TABLE estudiantes (
       id SERIAL PRIMARY KEY,
       carnet TEXT,
       nombre TEXT NOT NULL,
       cedula TEXT UNIQUE,
       fecha_nacimiento DATE,
       grado TEXT,
       id_representante INTEGER REFERENCES representantes (id)
     )",
    "INSERT INTO estudiantes (carnet, nombre, cedula, id_representante) VALUES ('EST-2024-0001', 'Luis', '30111222', 1)",
    "INSERT INTO estudiantes (carnet, nombre, cedula, id_representante) VALUES ('123456', 'Mia', NULL, 1)",
    "INSERT INTO estudiantes (carnet, nombre, cedula, id_representante) VALUES ('123456', 'Noe', NULL, 2)",
    "INSERT INTO estudiantes (carnet, nombre, cedula, id_representante) VALUES (NULL, 'Olga', NULL, 2)",
  ])
  .await;
}

async fn legacy_payments(s: &PostgresStore) {
  legacy_students(s).await;
  exec_all(s, &[
    "CREATE TABLE pagos (
       id SERIAL PRIMARY KEY,
       id_estudiante INTEGER REFERENCES estudiantes (id),
       monto NUMERIC(10,2),
       fecha DATE,
       concepto TEXT
     )",
    "INSERT INTO pagos (id_estudiante, monto, fecha, concepto) VALUES (1, 50, '2025-09-05', 'Septiembre')",
    "INSERT INTO pagos (id_estudiante, monto, fecha, concepto) VALUES (1, 50, '2025-10-04', 'Octubre')",
    "INSERT INTO pagos (id_estudiante, monto, fecha, concepto) VALUES (2, 45.5, '2026-01-10', NULL)",
  ])
  .await;
}

fn payment(month: u8) -> NewPayment {
  NewPayment {
    student_id: 1,
    amount:     50.0,
    month:      SchoolMonth::new(month).unwrap(),
    status:     PaymentStatus::Pending,
    due_date:   None,
    paid_date:  None,
    memo:       None,
  }
}

// ─── Fresh stores ────────────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_server_store_settles_in_one_run() {
  let Some(s) = store("registro_it_fresh").await else {
    return;
  };

  let first = migrate(&s).await;
  assert!(first.is_clean(), "{first:?}");
  assert_eq!(first.applied.len() + first.verified.len(), Step::ALL.len());
  let before = settled_state(&s).await;

  let second = migrate(&s).await;
  assert!(second.applied.is_empty(), "{:?}", second.applied);
  assert_eq!(second.verified.len(), Step::ALL.len());
  assert_eq!(settled_state(&s).await, before);
}

// ─── Legacy shapes ───────────────────────────────────────────────────────────

#[tokio::test]
async fn server_guardians_without_national_id_are_backfilled() {
  let Some(s) = store("registro_it_guardians").await else {
    return;
  };
  exec_all(&s, &[
    "CREATE TABLE representantes (
       id SERIAL PRIMARY KEY,
       nombre TEXT NOT NULL,
       email TEXT NOT NULL UNIQUE,
       password TEXT NOT NULL
     )",
    "INSERT INTO representantes (nombre, email, password) VALUES ('Ana', 'ana@x.com', 'h')",
    "INSERT INTO representantes (nombre, email, password) VALUES ('Beto', 'beto@x.com', 'h')",
    "INSERT INTO representantes (nombre, email, password) VALUES ('Carla', 'carla@x.com', 'h')",
  ])
  .await;

  let report = migrate(&s).await;
  assert!(report.applied.contains(&Step::GuardiansNationalId));
  assert!(report.is_clean(), "{report:?}");

  let ids = column_values(&s, "SELECT cedula AS v FROM representantes ORDER BY id").await;
  let distinct: HashSet<_> = ids.iter().cloned().collect();
  assert_eq!(distinct.len(), 3);
  for id in &ids {
    assert!(id.as_deref().is_some_and(is_national_id), "{id:?}");
  }

  let shape = catalog::shape(&s, Table::Guardians).await.unwrap();
  let cedula = shape.column("cedula").unwrap();
  assert_eq!(cedula.max_length, Some(10));
  assert!(!cedula.nullable);
  assert_eq!(
    uniques_on(&s, Table::Guardians, "cedula").await,
    vec![("representantes_cedula_key".to_owned(), UniqueOrigin::Constraint)]
  );
}

#[tokio::test]
async fn server_legacy_students_get_badges_and_guardian_references() {
  let Some(s) = store("registro_it_students").await else {
    return;
  };
  legacy_students(&s).await;

  let report = migrate(&s).await;
  assert!(report.is_clean(), "{report:?}");
  for step in [
    Step::GuardiansNationalId,
    Step::StudentsBadge,
    Step::StudentsGuardianRef,
    Step::StudentsNationalIdNotUnique,
  ] {
    assert!(report.applied.contains(&step), "{} not applied", step.name());
  }

  let guardians = catalog::shape(&s, Table::Guardians).await.unwrap();
  assert_eq!(guardians.column("cedula").unwrap().max_length, Some(10));

  let badges = column_values(&s, "SELECT carnet AS v FROM estudiantes ORDER BY id").await;
  assert_eq!(badges[1].as_deref(), Some("123456"), "in-format badge kept by lowest id");
  let distinct: HashSet<_> = badges.iter().cloned().collect();
  assert_eq!(distinct.len(), 4);
  for badge in &badges {
    assert!(badge.as_deref().is_some_and(is_badge_number), "{badge:?}");
  }

  let beto = column_values(&s, "SELECT cedula AS v FROM representantes WHERE id = 2").await;
  let beto = beto[0].clone().unwrap();
  assert!(is_national_id(&beto));
  let refs = column_values(&s, "SELECT cedula_representante AS v FROM estudiantes ORDER BY id").await;
  assert_eq!(refs, vec![
    Some("12345678".to_owned()),
    Some("12345678".to_owned()),
    Some(beto.clone()),
    Some(beto),
  ]);

  let shape = catalog::shape(&s, Table::Students).await.unwrap();
  assert!(!shape.has_column("id_representante"));
  assert!(shape.unique_on("cedula").is_none());
  assert!(shape.foreign_key_on("cedula_representante").is_some());
  assert!(!shape.column("carnet").unwrap().nullable);
  assert_eq!(
    uniques_on(&s, Table::Students, "carnet").await,
    vec![("estudiantes_carnet_key".to_owned(), UniqueOrigin::Constraint)]
  );
}

#[tokio::test]
async fn server_numeric_grades_become_text_with_kinds() {
  let Some(s) = store("registro_it_grades").await else {
    return;
  };
  legacy_students(&s).await;
  exec_all(&s, &[
    "CREATE TABLE notas (
       id SERIAL PRIMARY KEY,
       id_estudiante INTEGER REFERENCES estudiantes (id),
       materia TEXT NOT NULL,
       calificacion NUMERIC(4,2) NOT NULL,
       periodo TEXT NOT NULL
     )",
    "INSERT INTO notas (id_estudiante, materia, calificacion, periodo) VALUES (1, 'Matemática', 18, 'I')",
    "INSERT INTO notas (id_estudiante, materia, calificacion, periodo) VALUES (1, 'Lengua', 17.5, 'I')",
  ])
  .await;

  let report = migrate(&s).await;
  assert!(report.applied.contains(&Step::GradesValueText), "{report:?}");
  assert!(report.is_clean(), "{report:?}");

  let values = column_values(&s, "SELECT calificacion AS v FROM notas ORDER BY id").await;
  assert_eq!(values, vec![Some("18".to_owned()), Some("17.50".to_owned())]);
  let kinds = column_values(&s, "SELECT tipo_calificacion AS v FROM notas ORDER BY id").await;
  assert_eq!(kinds, vec![Some("numeric".to_owned()), Some("numeric".to_owned())]);

  let shape = catalog::shape(&s, Table::Grades).await.unwrap();
  assert!(shape.column("calificacion").unwrap().is_textual());
}

#[tokio::test]
async fn server_legacy_payments_move_to_school_periods() {
  let Some(s) = store("registro_it_payments").await else {
    return;
  };
  legacy_payments(&s).await;

  let report = migrate(&s).await;
  assert!(report.applied.contains(&Step::PaymentsPeriod));
  assert!(report.is_clean(), "{report:?}");

  let rows = s
    .execute(Statement::new(
      "SELECT mes, anio_escolar, fecha_pago, monto FROM pagos ORDER BY id",
    ))
    .await
    .unwrap();
  let months: Vec<i64> = rows.rows.iter().map(|r| r.require_integer("mes").unwrap()).collect();
  assert_eq!(months, vec![9, 10, 1]);
  for row in &rows.rows {
    assert_eq!(row.require_text("anio_escolar").unwrap(), "2025-2026");
  }
  assert_eq!(rows.rows[0].require_text("fecha_pago").unwrap(), "2025-09-05");
  assert_eq!(rows.rows[2].real("monto").unwrap(), Some(45.5));

  let foreign_keys = column_values(
    &s,
    "SELECT conname::text AS v FROM pg_constraint
     WHERE conrelid = 'pagos'::regclass AND contype = 'f'",
  )
  .await;
  assert_eq!(foreign_keys, vec![Some("pagos_id_estudiante_fkey".to_owned())]);

  let shape = catalog::shape(&s, Table::Payments).await.unwrap();
  let period = shape.uniques.iter().find(|u| u.name == "pagos_periodo_key").unwrap();
  assert_eq!(period.columns, vec!["id_estudiante", "mes", "anio_escolar"]);

  let duplicate = records::record_payment(&s, payment(9)).await;
  assert!(matches!(duplicate, Err(Error::UniqueViolation(_))));
  let next = records::record_payment(&s, payment(11)).await.unwrap();
  assert_eq!(next.id, 4);
}

#[tokio::test]
async fn repaired_guardian_unique_is_renamed_for_retry() {
  let Some(s) = store("registro_it_repaired").await else {
    return;
  };
  exec_all(&s, &[
    "CREATE TABLE representantes (
       id SERIAL PRIMARY KEY,
       cedula VARCHAR(10) NOT NULL CONSTRAINT representantes_cedula_unique UNIQUE,
       nombre TEXT NOT NULL,
       email TEXT NOT NULL UNIQUE,
       password TEXT NOT NULL
     )",
    "CREATE UNIQUE INDEX representantes_cedula_idx ON representantes (cedula)",
    "INSERT INTO representantes (cedula, nombre, email, password) VALUES ('1111111', 'Ana', 'ana@x.com', 'h')",
  ])
  .await;

  let report = migrate(&s).await;
  assert!(report.applied.contains(&Step::GuardiansNationalId), "{report:?}");
  assert!(report.is_clean(), "{report:?}");
  let uniques = uniques_on(&s, Table::Guardians, "cedula").await;
  assert_eq!(uniques.len(), 1, "{uniques:?}");
  assert_eq!(uniques[0].0, "representantes_cedula_key");

  let ids = IdentifierGenerator::new(scripted(&["1111111", "2222222"]), 10);
  let created = records::create_guardian(&s, &ids, NewGuardian {
    national_id:   None,
    name:          "Beto".to_owned(),
    email:         "beto@x.com".to_owned(),
    password_hash: "x".to_owned(),
  })
  .await
  .unwrap();
  assert_eq!(created.national_id.as_str(), "2222222");

  let again = migrate(&s).await;
  assert!(again.applied.is_empty(), "{:?}", again.applied);
}
