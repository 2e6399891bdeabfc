//! Session error taxonomy
//!
//! The first fatal error is recorded on the session and every later
//! `merge`/`finalize` call returns it verbatim, so the variants here are
//! cheap to clone.

use crate::engine::{EngineError, ENGINE_TABLE_FULL};
use czar_core::SessionId;
use czar_proto::FrameError;
use thiserror::Error;

/// Errors that end a merge session
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MergeError {
    /// A frame failed to decode or verify
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// DDL for the merge table failed
    #[error("error creating merge table {table}: {source}")]
    CreateTable {
        table: String,
        source: EngineError,
    },

    /// The SQL connection is not established
    #[error("SQL connection not established: {0}")]
    Connect(EngineError),

    /// A SQL statement failed
    #[error("error applying SQL: {0}")]
    Exec(EngineError),

    /// A frame carried a session id other than the session's own
    #[error("frame for {got} delivered to {expected}")]
    SessionMismatch { expected: SessionId, got: SessionId },

    /// The user cancelled the query
    #[error("query session was cancelled")]
    Cancelled,

    /// `merge` was called after the session finalized
    #[error("merge called on a finished session")]
    SessionFinished,
}

impl MergeError {
    /// Whether this is the engine's "table is full" condition, which
    /// higher layers report as a result-size quota error.
    pub fn result_too_big(&self) -> bool {
        matches!(self, MergeError::Exec(e) if e.code == ENGINE_TABLE_FULL)
    }
}

/// Result type for merge operations
pub type Result<T> = std::result::Result<T, MergeError>;
