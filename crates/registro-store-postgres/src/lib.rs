//! PostgreSQL backend for the Registro store.
//!
//! A [`deadpool_postgres`] pool of plain `tokio-postgres` clients. The
//! server-side `statement_timeout` is set on every pooled connection.

mod encode;
mod error;
mod store;

pub use store::{PostgresSettings, PostgresStore};
