//! Error types for frame decoding

use thiserror::Error;

/// Errors raised while decoding or encoding a result frame.
///
/// Insufficient input is not an error: the codec reports it as
/// [`DecodeOutcome::NeedMore`](crate::codec::DecodeOutcome) so callers
/// can buffer more bytes and retry. Every variant here is fatal for the
/// query session that owns the stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Header envelope was present but failed to decode
    #[error("header envelope decode failed: {0}")]
    HeaderImport(String),

    /// Declared payload exceeds the codec's frame limit
    #[error("declared payload of {declared} bytes exceeds the {max} byte frame limit")]
    HeaderOverflow { declared: u64, max: u64 },

    /// Result envelope failed to decode; the stream is corrupt
    #[error("result envelope decode failed: {0}")]
    ResultImport(String),

    /// Payload digest did not match the header's declared digest
    #[error("result payload MD5 mismatch")]
    DigestMismatch,

    /// Envelope could not be encoded for the wire
    #[error("envelope encode failed: {0}")]
    Encode(String),
}

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, FrameError>;
