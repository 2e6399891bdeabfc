//! Wire protocol for worker-to-czar result streams
//!
//! A worker ships one query-chunk result as a single binary frame:
//!
//! ```text
//! offset 0     : u8     H          length of the header envelope
//! offset 1     : [u8]   header[H]  bincode FrameHeader
//! offset 1+H   : [u8]   payload    bincode ResultEnvelope
//! ```
//!
//! The header declares the payload size and an MD5 digest of the payload
//! bytes exactly as laid out on the wire. The codec never blocks and
//! consumes either zero or one whole frame per call.

pub mod codec;
pub mod envelope;
pub mod error;

// Re-exports
pub use codec::{DecodeOutcome, DecodedFrame, FrameCodec, PROTOCOL_VERSION};
pub use envelope::{FrameHeader, ResultEnvelope};
pub use error::{FrameError, Result};
