//! SQLite persistence module.
//!
//! Provides the connection pool, embedded schema migrations, and the helpers
//! used to run dynamic reminder and dedupe queries.

pub mod pool;
pub mod query;

pub use pool::{DatabaseError, DatabasePool};
pub use query::{bind_all, SqlValue, TextRow};
