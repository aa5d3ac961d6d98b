//! Schema evolution, identifier arbitration and bootstrap seeding for the
//! Registro records store.
//!
//! Everything here is generic over [`registro_core::Store`]; the same code
//! path runs against SQLite and PostgreSQL, consulting the store's
//! [`Dialect`](registro_core::Dialect) where the SQL must differ.

pub mod bootstrap;
pub mod catalog;
pub mod identifiers;
pub mod ledger;
pub mod migrator;
pub mod records;
pub mod seed;
pub mod steps;

mod rebuild;
mod tables;

pub use bootstrap::{BootstrapReport, bootstrap};
pub use identifiers::{CandidateSource, IdentifierGenerator, RandomCandidates};
pub use migrator::{MigrationReport, Migrator};
pub use seed::{AdminSeed, Argon2Hasher, CredentialHasher, SeedOutcome};
pub use tables::current_columns;

#[cfg(test)]
mod postgres_tests;
