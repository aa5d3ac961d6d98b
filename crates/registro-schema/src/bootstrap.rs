//! Startup sequence: migrate, then seed.

use registro_core::{Result, Store};
use serde::Serialize;

use crate::{
  identifiers::{CandidateSource, IdentifierGenerator},
  migrator::{MigrationReport, Migrator},
  seed::{AdminSeed, CredentialHasher, SeedOutcome, ensure_admin},
};

#[derive(Debug, Clone, Serialize)]
pub struct BootstrapReport {
  pub migration: MigrationReport,
  /// `None` when the administrators table could not be brought up.
  pub seed:      Option<SeedOutcome>,
}

/// Bring the schema to its current shape and make sure the administrator
/// exists. Step failures are reported, not returned; seeding is skipped when
/// the administrators step did not succeed.
pub async fn bootstrap<S, C, H>(
  store: &S,
  ids: &IdentifierGenerator<C>,
  hasher: &H,
  seed: &AdminSeed,
) -> Result<BootstrapReport>
where
  S: Store,
  C: CandidateSource,
  H: CredentialHasher + ?Sized,
{
  let migration = Migrator::new(store, ids).run().await?;

  let admin_ready = !migration
    .failed
    .iter()
    .any(|f| f.step == crate::steps::Step::AdministratorsCreate);
  let seed = if admin_ready {
    Some(ensure_admin(store, hasher, seed).await?)
  } else {
    tracing::warn!("administrators table unavailable; skipping seed");
    None
  };

  Ok(BootstrapReport { migration, seed })
}
