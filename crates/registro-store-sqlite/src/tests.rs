//! Integration tests for `SqliteStore` against in-memory and file databases.

use registro_core::{Dialect, Error, Statement, Store, Table, Value};

use crate::{SqliteSettings, SqliteStore};

async fn store() -> SqliteStore {
  let s = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  s.execute(Statement::new(
    "CREATE TABLE representantes (
       id INTEGER PRIMARY KEY AUTOINCREMENT,
       cedula TEXT NOT NULL UNIQUE,
       nombre TEXT NOT NULL
     )",
  ))
  .await
  .unwrap();
  s
}

// ─── Execute ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn logical_placeholders_are_translated() {
  let s = store().await;
  assert_eq!(s.dialect(), Dialect::Sqlite);

  let inserted = s
    .execute(
      Statement::new("INSERT INTO representantes (cedula, nombre) VALUES ($1, $2) RETURNING id")
        .bind("12345678")
        .bind("Ana"),
    )
    .await
    .unwrap();
  assert_eq!(inserted.affected, 1);
  let id = inserted.first().unwrap().require_integer("id").unwrap();

  let fetched = s
    .execute(Statement::new("SELECT nombre FROM representantes WHERE id = $1").bind(id))
    .await
    .unwrap();
  assert_eq!(fetched.first().unwrap().require_text("nombre").unwrap(), "Ana");
}

#[tokio::test]
async fn dollar_signs_inside_literals_survive() {
  let s = store().await;
  let result = s
    .execute(Statement::new("SELECT '$1' AS literal, $1 AS bound").bind(7))
    .await
    .unwrap();
  let row = result.first().unwrap();
  assert_eq!(row.get("literal"), Some(&Value::Text("$1".into())));
  assert_eq!(row.get("bound"), Some(&Value::Integer(7)));
}

#[tokio::test]
async fn update_reports_affected_rows() {
  let s = store().await;
  for (cedula, nombre) in [("1111111", "A"), ("2222222", "B"), ("3333333", "C")] {
    s.execute(
      Statement::new("INSERT INTO representantes (cedula, nombre) VALUES ($1, $2)")
        .bind(cedula)
        .bind(nombre),
    )
    .await
    .unwrap();
  }

  let updated = s
    .execute(Statement::new("UPDATE representantes SET nombre = 'X' WHERE cedula <> $1").bind("1111111"))
    .await
    .unwrap();
  assert_eq!(updated.affected, 2);
}

// ─── Errors ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_identifier_is_a_unique_violation_on_that_column() {
  let s = store().await;
  let insert = || {
    Statement::new("INSERT INTO representantes (cedula, nombre) VALUES ($1, $2)")
      .bind("12345678")
      .bind("Ana")
  };
  s.execute(insert()).await.unwrap();

  match s.execute(insert()).await.unwrap_err() {
    Error::UniqueViolation(db) => {
      assert!(Dialect::Sqlite.unique_violation_on(&db, Table::Guardians, "cedula"));
      assert!(!Dialect::Sqlite.unique_violation_on(&db, Table::Guardians, "email"));
    }
    other => panic!("expected unique violation, got {other:?}"),
  }
}

#[tokio::test]
async fn unknown_table_is_a_database_error() {
  let s = store().await;
  let err = s
    .execute(Statement::new("SELECT * FROM nowhere"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Database(_)));
}

// ─── Transactions ────────────────────────────────────────────────────────────

#[tokio::test]
async fn transaction_commits_all_statements() {
  let s = store().await;
  let results = s
    .transaction(vec![
      Statement::new("INSERT INTO representantes (cedula, nombre) VALUES ($1, 'A')").bind("1111111"),
      Statement::new("INSERT INTO representantes (cedula, nombre) VALUES ($1, 'B')").bind("2222222"),
      Statement::new("SELECT COUNT(*) AS n FROM representantes"),
    ])
    .await
    .unwrap();
  assert_eq!(results.len(), 3);
  assert_eq!(results[2].first().unwrap().require_integer("n").unwrap(), 2);
}

#[tokio::test]
async fn failed_transaction_rolls_back() {
  let s = store().await;
  let err = s
    .transaction(vec![
      Statement::new("INSERT INTO representantes (cedula, nombre) VALUES ($1, 'A')").bind("1111111"),
      Statement::new("INSERT INTO representantes (cedula, nombre) VALUES ($1, 'B')").bind("1111111"),
    ])
    .await
    .unwrap_err();
  assert!(err.is_unique_violation());

  let count = s
    .execute(Statement::new("SELECT COUNT(*) AS n FROM representantes"))
    .await
    .unwrap();
  assert_eq!(count.first().unwrap().require_integer("n").unwrap(), 0);
}

// ─── Files ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn file_database_persists_across_handles() {
  let dir = std::env::temp_dir().join(format!("registro-sqlite-{}", std::process::id()));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("persist.db");
  let _ = std::fs::remove_file(&path);

  {
    let s = SqliteStore::open(&path, SqliteSettings::default()).await.unwrap();
    s.execute(Statement::new("CREATE TABLE t (x INTEGER)")).await.unwrap();
    s.execute(Statement::new("INSERT INTO t VALUES ($1)").bind(5)).await.unwrap();
  }

  let s = SqliteStore::open(&path, SqliteSettings::default()).await.unwrap();
  let rows = s.execute(Statement::new("SELECT x FROM t")).await.unwrap();
  assert_eq!(rows.first().unwrap().require_integer("x").unwrap(), 5);
  assert_eq!(
    s.execute(Statement::raw("PRAGMA foreign_keys")).await.unwrap().rows[0].values()[0],
    Value::Integer(1)
  );

  drop(s);
  let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn unreachable_path_is_a_connection_error() {
  let err = SqliteStore::open("/nonexistent-dir/registro/db.sqlite", SqliteSettings::default())
    .await
    .err()
    .unwrap();
  assert!(matches!(err, Error::Connection(_)));
}
