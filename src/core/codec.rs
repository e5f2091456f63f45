//! Audio frame codec.
//!
//! Both legs of a call carry audio as base64 text inside their JSON envelopes.
//! Internally audio travels as raw bytes in an [`AudioChunk`]. The payload is
//! passed through untouched: the telephony leg and the agent are expected to
//! agree on the wire format (G.711 u-law, 8kHz, mono).

use base64::prelude::*;
use bytes::Bytes;
use thiserror::Error;

/// Error returned when a base64 audio payload cannot be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not valid standard base64
    #[error("Invalid base64 audio payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// An immutable slice of call audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk(Bytes);

impl AudioChunk {
    /// Wrap raw audio bytes.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    /// Raw audio bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the chunk carries no audio.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for AudioChunk {
    fn from(data: Vec<u8>) -> Self {
        Self(Bytes::from(data))
    }
}

impl From<Bytes> for AudioChunk {
    fn from(data: Bytes) -> Self {
        Self(data)
    }
}

/// Decode a base64 payload into an audio chunk.
pub fn decode(payload: &str) -> Result<AudioChunk, DecodeError> {
    let raw = BASE64_STANDARD.decode(payload)?;
    Ok(AudioChunk::from(raw))
}

/// Encode an audio chunk as a base64 payload.
pub fn encode(chunk: &AudioChunk) -> String {
    BASE64_STANDARD.encode(chunk.as_bytes())
}
