//! Seam to the SQL engine
//!
//! The merger drives the engine with plain SQL text: DDL for the merge
//! table, one bulk-load statement per frame, and the finalize
//! projection. Implementations resolve the virtual infile names in
//! bulk-load statements through the [`LoadChannelRegistry`] they were
//! constructed with.
//!
//! [`LoadChannelRegistry`]: crate::infile::LoadChannelRegistry

use thiserror::Error;

/// Engine code for "the table is full", raised when a merge result
/// outgrows the engine's table limits. Surfaced to users as a result
/// quota error rather than an internal failure.
pub const ENGINE_TABLE_FULL: u32 = 1114;

/// Error returned by the SQL engine for one statement.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("engine error {code}: {message}")]
pub struct EngineError {
    pub code: u32,
    pub message: String,
}

impl EngineError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// One SQL connection, driven by statement text.
///
/// The merge manager wraps the engine in its connection mutex; an
/// implementation does not need to be internally synchronized, only
/// movable across threads.
pub trait SqlEngine: Send {
    /// Execute one statement to completion
    fn execute(&mut self, sql: &str) -> std::result::Result<(), EngineError>;

    /// Whether the underlying connection is established
    fn connected(&self) -> bool {
        true
    }
}
