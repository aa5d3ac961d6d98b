//! Ensures the administrative account exists.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use rand_core::OsRng;
use registro_core::{Error, Result, Statement, Store};
use serde::Serialize;

/// Turns a plain-text password into the stored credential.
pub trait CredentialHasher: Send + Sync {
  fn hash(&self, password: &str) -> Result<String>;
}

/// argon2id with default parameters, producing a PHC string
/// (`$argon2id$v=19$…`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Hasher;

impl CredentialHasher for Argon2Hasher {
  fn hash(&self, password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map(|h| h.to_string())
      .map_err(|e| Error::Hash(e.to_string()))
  }
}

impl Argon2Hasher {
  /// Whether `password` matches the PHC string `hash`.
  pub fn verify(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
      .is_ok_and(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
  }
}

/// The well-known administrator created on first start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSeed {
  pub name:     String,
  pub email:    String,
  pub password: String,
}

impl Default for AdminSeed {
  fn default() -> Self {
    Self {
      name:     "Administrador".to_owned(),
      email:    "admin@colegio.com".to_owned(),
      password: "admin123".to_owned(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "id", rename_all = "snake_case")]
pub enum SeedOutcome {
  Created(i64),
  AlreadyPresent,
}

/// Insert the administrator unless one with the seed email exists.
///
/// A concurrent start that inserts the same account first is reported as
/// [`SeedOutcome::AlreadyPresent`].
pub async fn ensure_admin<S, H>(store: &S, hasher: &H, seed: &AdminSeed) -> Result<SeedOutcome>
where
  S: Store,
  H: CredentialHasher + ?Sized,
{
  let existing = store
    .execute(Statement::new("SELECT id FROM administradores WHERE email = $1").bind(seed.email.as_str()))
    .await?;
  if !existing.is_empty() {
    tracing::debug!(email = %seed.email, "administrator already present");
    return Ok(SeedOutcome::AlreadyPresent);
  }

  let hash = hasher.hash(&seed.password)?;
  let inserted = store
    .execute(
      Statement::new(
        "INSERT INTO administradores (nombre, email, password) VALUES ($1, $2, $3) RETURNING id",
      )
      .bind(seed.name.as_str())
      .bind(seed.email.as_str())
      .bind(hash),
    )
    .await;

  match inserted {
    Ok(result) => {
      let id = result
        .first()
        .ok_or_else(|| Error::Decode("insert returned no id".to_owned()))?
        .require_integer("id")?;
      tracing::info!(id, email = %seed.email, "created administrator");
      Ok(SeedOutcome::Created(id))
    }
    Err(e) if e.is_unique_violation() => Ok(SeedOutcome::AlreadyPresent),
    Err(e) => Err(e),
  }
}
