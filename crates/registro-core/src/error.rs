//! Error types for `registro-core`.
//!
//! Every backend maps its native driver errors into [`Error`], so callers
//! never need to know which backend is active. Native error codes are kept on
//! [`DatabaseError`] and interpreted through the [`Dialect`].

use std::{fmt, time::Duration};

use thiserror::Error;

use crate::{dialect::Dialect, ident::IdFamily};

/// A failure reported by the database itself, with its native error code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseError {
  pub backend:    Dialect,
  /// `SQLSTATE` for PostgreSQL (`"23505"`), extended result code for SQLite
  /// (`"2067"`).
  pub code:       Option<String>,
  /// Name of the violated constraint, when the backend reports one.
  pub constraint: Option<String>,
  pub message:    String,
}

impl fmt::Display for DatabaseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.code {
      Some(code) => write!(f, "{} [{code}]: {}", self.backend.name(), self.message),
      None       => write!(f, "{}: {}", self.backend.name(), self.message),
    }
  }
}

impl std::error::Error for DatabaseError {}

#[derive(Debug, Error)]
pub enum Error {
  /// The backend could not be reached or the connection was lost.
  #[error("backend unreachable: {0}")]
  Connection(String),

  #[error("unique constraint violated: {0}")]
  UniqueViolation(DatabaseError),

  #[error("database error: {0}")]
  Database(DatabaseError),

  #[error("statement exceeded the {0:?} timeout")]
  Timeout(Duration),

  #[error("migration step {step} failed: {source}")]
  MigrationStep {
    step:   &'static str,
    #[source]
    source: Box<Error>,
  },

  /// No free identifier was found within the attempt budget.
  #[error("no free {family} found after {attempts} attempts")]
  IdentifierExhausted { family: IdFamily, attempts: u32 },

  #[error("invalid {family}: {value:?}")]
  InvalidIdentifier { family: IdFamily, value: String },

  #[error("invalid value: {0}")]
  InvalidValue(String),

  #[error("decode error: {0}")]
  Decode(String),

  #[error("password hashing failed: {0}")]
  Hash(String),

  #[error("configuration error: {0}")]
  Config(String),
}

impl Error {
  pub fn is_unique_violation(&self) -> bool { matches!(self, Self::UniqueViolation(_)) }

  /// Wrap `self` as the failure of the named migration step.
  pub fn in_step(self, step: &'static str) -> Self {
    match self {
      Self::MigrationStep { .. } => self,
      other => Self::MigrationStep { step, source: Box::new(other) },
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
