//! SQLite backend for the Registro store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. The single connection serializes every
//! call.

mod encode;
mod error;
mod store;

pub use store::{SqliteSettings, SqliteStore};

#[cfg(test)]
mod tests;
