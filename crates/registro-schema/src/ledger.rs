//! The append-only record of applied migration steps.

use std::collections::HashSet;

use chrono::Utc;
use registro_core::{Result, Statement, Store, Table};
use serde::Serialize;

use crate::tables::create_table;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
  pub step:       String,
  pub applied_at: String,
}

pub async fn ensure<S: Store>(store: &S) -> Result<()> {
  let ddl = create_table(store.dialect(), Table::Ledger, Table::Ledger.as_str());
  store.execute(ddl).await?;
  Ok(())
}

pub async fn entries<S: Store>(store: &S) -> Result<Vec<LedgerEntry>> {
  let result = store
    .execute(Statement::new(format!(
      "SELECT step, applied_at FROM {} ORDER BY step",
      Table::Ledger
    )))
    .await?;
  result
    .rows
    .iter()
    .map(|row| {
      Ok(LedgerEntry {
        step:       row.require_text("step")?,
        applied_at: row.require_text("applied_at")?,
      })
    })
    .collect()
}

pub async fn applied<S: Store>(store: &S) -> Result<HashSet<String>> {
  Ok(entries(store).await?.into_iter().map(|e| e.step).collect())
}

/// Record `step` as applied now. Re-recording refreshes the timestamp.
pub async fn record<S: Store>(store: &S, step: &str) -> Result<()> {
  store
    .execute(
      Statement::new(format!(
        "INSERT INTO {} (step, applied_at) VALUES ($1, $2)
         ON CONFLICT (step) DO UPDATE SET applied_at = excluded.applied_at",
        Table::Ledger
      ))
      .bind(step)
      .bind(Utc::now().to_rfc3339()),
    )
    .await?;
  Ok(())
}
