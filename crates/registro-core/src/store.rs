//! The `Store` trait: one call interface over every supported backend.
//!
//! A store owns the process-wide connection (or pool) and is created once at
//! startup, then shared by cloning or by reference. Higher layers are generic
//! over `S: Store` and never branch on which backend is active; where SQL
//! must differ they ask [`Store::dialect`].

use std::future::Future;

use crate::{
  Result,
  dialect::Dialect,
  value::{QueryResult, Statement},
};

pub trait Store: Send + Sync {
  /// The dialect of the backend behind this store.
  fn dialect(&self) -> Dialect;

  /// Execute one parameterized statement.
  ///
  /// Unique-constraint failures are reported as
  /// [`Error::UniqueViolation`](crate::Error::UniqueViolation); an unreachable
  /// backend as [`Error::Connection`](crate::Error::Connection).
  fn execute(
    &self,
    statement: Statement,
  ) -> impl Future<Output = Result<QueryResult>> + Send + '_;

  /// Execute `statements` in order inside a single transaction. Either all of
  /// them take effect or none does.
  fn transaction(
    &self,
    statements: Vec<Statement>,
  ) -> impl Future<Output = Result<Vec<QueryResult>>> + Send + '_;
}
