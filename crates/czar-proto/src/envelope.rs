//! Frame envelopes
//!
//! Both envelopes are length-delimited bincode records. The header is
//! kept deliberately small so its length always fits the one-byte
//! prefix of the frame.

use czar_core::{Row, RowSchema, SessionId};
use serde::{Deserialize, Serialize};

/// Envelope prefix describing one result payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    /// Wire protocol version
    pub version: u8,
    /// Size in bytes of the result envelope that follows
    pub payload_size: u64,
    /// MD5 digest of the payload bytes as laid out on the wire
    pub digest: [u8; 16],
}

/// Decoded result payload: one chunk result from one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    /// Session the worker is answering for; echoed from the dispatch
    pub session_id: SessionId,
    /// Schema of the rows below, in declaration order
    pub row_schema: RowSchema,
    /// Result rows, in the order the worker produced them
    pub rows: Vec<Row>,
}

impl ResultEnvelope {
    pub fn new(session_id: SessionId, row_schema: RowSchema, rows: Vec<Row>) -> Self {
        Self {
            session_id,
            row_schema,
            rows,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
