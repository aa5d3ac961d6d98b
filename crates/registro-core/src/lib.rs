//! Core types and trait definitions for the Registro records store.
//!
//! This crate is free of database drivers. Backends (`registro-store-sqlite`,
//! `registro-store-postgres`) implement [`store::Store`]; the schema layer and
//! the server depend on this abstraction only.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod dialect;
pub mod entity;
pub mod error;
pub mod ident;
pub mod period;
pub mod store;
pub mod value;

pub use dialect::{Dialect, Table};
pub use error::{DatabaseError, Error, Result};
pub use store::Store;
pub use value::{QueryResult, Row, Statement, Value};
