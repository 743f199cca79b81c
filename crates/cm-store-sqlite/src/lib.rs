//! SQLite backend for the company manager.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Predicates are lowered to
//! parameterized SQL; column names only ever come from the static shapes.

mod encode;
mod schema;
mod sql;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{SqliteSession, SqliteStore};
