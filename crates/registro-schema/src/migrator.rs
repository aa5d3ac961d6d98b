//! Runs every migration step in order against one store.
//!
//! The ledger says which steps ran before; the catalog says whether their
//! effect is still there. A recorded step is verified rather than re-run,
//! and re-applied (with a warning) when the catalog disagrees. A step whose
//! prerequisite failed or was skipped in this run is skipped; steps that do
//! not depend on it still run.

use std::collections::HashSet;

use registro_core::{Error, Result, Store, Table};
use serde::Serialize;

use crate::{
  catalog,
  identifiers::{CandidateSource, IdentifierGenerator, RandomCandidates},
  ledger,
  steps::Step,
  tables::current_columns,
};

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct StepFailure {
  pub step:  Step,
  pub error: String,
}

/// A table missing columns of its current shape after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Drift {
  pub table:   Table,
  pub missing: Vec<&'static str>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
  /// Steps that changed the schema in this run.
  pub applied:  Vec<Step>,
  /// Steps whose effect was already present.
  pub verified: Vec<Step>,
  /// Steps not attempted because a prerequisite did not succeed.
  pub skipped:  Vec<Step>,
  pub failed:   Vec<StepFailure>,
  pub drift:    Vec<Drift>,
}

impl MigrationReport {
  pub fn is_clean(&self) -> bool {
    self.failed.is_empty() && self.skipped.is_empty() && self.drift.is_empty()
  }
}

// ─── Migrator ────────────────────────────────────────────────────────────────

pub struct Migrator<'a, S, C = RandomCandidates> {
  store: &'a S,
  ids:   &'a IdentifierGenerator<C>,
}

enum Outcome {
  Applied,
  Verified,
}

impl<'a, S, C> Migrator<'a, S, C>
where
  S: Store,
  C: CandidateSource,
{
  pub fn new(store: &'a S, ids: &'a IdentifierGenerator<C>) -> Self { Self { store, ids } }

  /// Run every step. Only a failure to reach the ledger is returned as an
  /// error; step failures are collected in the report.
  pub async fn run(&self) -> Result<MigrationReport> {
    ledger::ensure(self.store).await?;
    let recorded = ledger::applied(self.store).await?;

    let mut report = MigrationReport::default();
    let mut blocked: HashSet<Step> = HashSet::new();

    for step in Step::ALL {
      if let Some(missing) = step.depends_on().iter().find(|d| blocked.contains(*d)) {
        tracing::warn!(step = step.name(), prerequisite = missing.name(), "skipping step");
        blocked.insert(step);
        report.skipped.push(step);
        continue;
      }

      match self.run_step(step, recorded.contains(step.name())).await {
        Ok(Outcome::Applied) => report.applied.push(step),
        Ok(Outcome::Verified) => report.verified.push(step),
        Err(e) => {
          let e = e.in_step(step.name());
          tracing::error!(step = step.name(), error = %e, "migration step failed");
          blocked.insert(step);
          report.failed.push(StepFailure { step, error: e.to_string() });
        }
      }
    }

    report.drift = self.drift().await?;
    for drift in &report.drift {
      tracing::warn!(table = %drift.table, missing = ?drift.missing, "schema drift after migration");
    }

    tracing::info!(
      applied = report.applied.len(),
      verified = report.verified.len(),
      skipped = report.skipped.len(),
      failed = report.failed.len(),
      "migration finished"
    );
    Ok(report)
  }

  async fn run_step(&self, step: Step, recorded: bool) -> Result<Outcome> {
    let name = step.name();
    if step.is_satisfied(self.store).await? {
      if recorded {
        tracing::debug!(step = name, "verified");
      } else {
        ledger::record(self.store, name).await?;
        tracing::debug!(step = name, "already in shape, recorded");
      }
      return Ok(Outcome::Verified);
    }

    if recorded {
      tracing::warn!(step = name, "recorded as applied but the catalog disagrees; re-applying");
    }
    step.apply(self.store, self.ids).await?;
    if !step.is_satisfied(self.store).await? {
      return Err(Error::InvalidValue(format!("{name} left the schema short of its target shape")));
    }
    ledger::record(self.store, name).await?;
    tracing::info!(step = name, "applied");
    Ok(Outcome::Applied)
  }

  /// Domain tables missing any of their current columns.
  pub async fn drift(&self) -> Result<Vec<Drift>> { drift(self.store).await }
}

/// Domain tables missing any of their current columns.
pub async fn drift<S: Store>(store: &S) -> Result<Vec<Drift>> {
  let mut drift = Vec::new();
  for table in Table::DOMAIN {
    let shape = catalog::shape(store, table).await?;
    let missing = shape.missing(current_columns(table));
    if !missing.is_empty() {
      drift.push(Drift { table, missing });
    }
  }
  Ok(drift)
}
