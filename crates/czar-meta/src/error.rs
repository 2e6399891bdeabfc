//! Error types for metadata resolution

use thiserror::Error;

/// Errors raised while resolving table metadata
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetaError {
    /// The store's metadata for a table violates a partitioning invariant
    #[error("invalid table metadata: {0}")]
    InvalidTable(String),

    /// The configuration store could not answer a lookup
    #[error("configuration store error: {0}")]
    Store(String),
}

/// Result type for metadata operations
pub type Result<T> = std::result::Result<T, MetaError>;
