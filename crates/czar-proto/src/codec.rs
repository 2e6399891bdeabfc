//! Streaming frame codec
//!
//! The codec is stateless: callers hand it the bytes they have and slide
//! their window by the consumed count of each decoded frame. A frame is
//! consumed whole or not at all.

use crate::envelope::{FrameHeader, ResultEnvelope};
use crate::error::{FrameError, Result};
use bytes::BufMut;
use md5::{Digest, Md5};

/// Current wire protocol version
pub const PROTOCOL_VERSION: u8 = 1;

/// Default upper bound on a single frame's payload
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024 * 1024; // 64 MiB

/// Outcome of one decode attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    /// One whole frame was decoded
    Frame(DecodedFrame),
    /// The buffer does not yet hold a whole frame; no bytes consumed
    NeedMore,
}

/// A fully decoded frame and the bytes it occupied on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    /// The header envelope
    pub header: FrameHeader,
    /// The decoded result payload
    pub envelope: ResultEnvelope,
    /// Total wire bytes of this frame: `1 + H + payload_size`
    pub consumed: usize,
}

/// Parses and emits the two-part result frame.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_payload: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self {
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl FrameCodec {
    /// Create a codec with a custom payload bound
    pub fn new(max_payload: usize) -> Self {
        Self { max_payload }
    }

    /// Attempt to decode one frame from the front of `buf`.
    ///
    /// Returns [`DecodeOutcome::NeedMore`] without consuming anything
    /// when the buffer holds less than one whole frame. Errors are fatal
    /// for the stream; the digest is computed over the raw payload bytes,
    /// never over a re-serialized decode.
    pub fn decode(&self, buf: &[u8]) -> Result<DecodeOutcome> {
        if buf.is_empty() {
            return Ok(DecodeOutcome::NeedMore);
        }
        // One byte of header length; unsigned, so always < 256.
        let header_len = buf[0] as usize;
        if buf.len() < 1 + header_len {
            return Ok(DecodeOutcome::NeedMore);
        }
        let header: FrameHeader = bincode::deserialize(&buf[1..1 + header_len])
            .map_err(|e| FrameError::HeaderImport(e.to_string()))?;

        if header.payload_size > self.max_payload as u64 {
            return Err(FrameError::HeaderOverflow {
                declared: header.payload_size,
                max: self.max_payload as u64,
            });
        }
        let payload_size = header.payload_size as usize;
        if buf.len() < 1 + header_len + payload_size {
            return Ok(DecodeOutcome::NeedMore);
        }

        let payload = &buf[1 + header_len..1 + header_len + payload_size];
        let envelope: ResultEnvelope = bincode::deserialize(payload)
            .map_err(|e| FrameError::ResultImport(e.to_string()))?;

        if Self::digest(payload) != header.digest {
            return Err(FrameError::DigestMismatch);
        }

        Ok(DecodeOutcome::Frame(DecodedFrame {
            header,
            envelope,
            consumed: 1 + header_len + payload_size,
        }))
    }

    /// Encode one envelope as a wire frame.
    pub fn encode(&self, envelope: &ResultEnvelope) -> Result<Vec<u8>> {
        let payload =
            bincode::serialize(envelope).map_err(|e| FrameError::Encode(e.to_string()))?;
        if payload.len() > self.max_payload {
            return Err(FrameError::HeaderOverflow {
                declared: payload.len() as u64,
                max: self.max_payload as u64,
            });
        }
        let header = FrameHeader {
            version: PROTOCOL_VERSION,
            payload_size: payload.len() as u64,
            digest: Self::digest(&payload),
        };
        let header_bytes =
            bincode::serialize(&header).map_err(|e| FrameError::Encode(e.to_string()))?;
        if header_bytes.len() > u8::MAX as usize {
            return Err(FrameError::Encode(format!(
                "header envelope of {} bytes cannot be length-prefixed in one byte",
                header_bytes.len()
            )));
        }

        let mut frame = Vec::with_capacity(1 + header_bytes.len() + payload.len());
        frame.put_u8(header_bytes.len() as u8);
        frame.put_slice(&header_bytes);
        frame.put_slice(&payload);
        Ok(frame)
    }

    fn digest(payload: &[u8]) -> [u8; 16] {
        let mut hasher = Md5::new();
        hasher.update(payload);
        hasher.finalize().into()
    }
}
