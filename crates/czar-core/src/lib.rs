//! Shared types for the czar coordinator
//!
//! This crate holds the vocabulary shared by the wire protocol and the
//! result-merging engine:
//!
//! - [`types`]: uuid-backed identifier newtypes
//! - [`schema`]: the row schema a worker declares for a result stream,
//!   and the rows that accompany it

pub mod schema;
pub mod types;

// Re-exports
pub use schema::{ColumnSchema, Row, RowSchema};
pub use types::SessionId;
