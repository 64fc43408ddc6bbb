//! Error types for the frame codec.
//!
//! The taxonomy separates framing errors (the byte layout of a frame is
//! wrong), protocol errors (the frame is well formed but its tag or payload
//! cannot be interpreted), I/O errors, and end-of-stream conditions.
//!
//! Every variant is fatal to the connection that produced it: the stream
//! cannot be resynchronised once a frame boundary is lost, so the owner must
//! tear the connection down and reconnect.

use std::io;

use thiserror::Error;

use crate::tag::MessageTag;

/// Wire-level errors in the frame layout.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// The first byte of the stream names a protocol version we cannot speak.
    #[error("unsupported protocol version: {version}")]
    UnsupportedVersion {
        /// Version byte received from the peer.
        version: u8,
    },

    /// The size varint is longer than any valid frame size allows, or its
    /// value does not fit a frame length.
    #[error("invalid frame size encoding")]
    InvalidLengthEncoding,

    /// The size varint announces a payload above the configured maximum.
    #[error("frame exceeds max length: {size} > {max}")]
    OversizedFrame {
        /// Announced payload size.
        size: usize,
        /// Maximum accepted payload size.
        max: usize,
    },
}

/// Errors interpreting a frame whose boundaries were read correctly.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The tag byte is not in the message-tag catalog.
    #[error("unknown message tag: {tag}")]
    UnknownMessageTag {
        /// Raw tag byte.
        tag: u8,
    },

    /// The payload is not a valid protobuf encoding of the tag's type.
    #[error("malformed {tag} payload: {reason}")]
    MalformedPayload {
        /// Tag naming the expected message type.
        tag: MessageTag,
        /// Decoder diagnostic.
        reason: String,
    },
}

/// End-of-stream conditions with a partially buffered frame.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EofError {
    /// The stream ended inside a frame header.
    #[error("premature EOF during header: {bytes_received} header bytes buffered")]
    MidHeader {
        /// Header bytes buffered before EOF.
        bytes_received: usize,
    },

    /// The stream ended inside a payload.
    #[error("premature EOF: {bytes_received} bytes of {expected} byte payload received")]
    MidFrame {
        /// Payload bytes buffered before EOF.
        bytes_received: usize,
        /// Announced payload size.
        expected: usize,
    },
}

/// Top-level codec error.
///
/// # Examples
///
/// ```
/// use pushframe::codec::{CodecError, ProtocolError};
///
/// let err = CodecError::Protocol(ProtocolError::UnknownMessageTag { tag: 42 });
/// assert_eq!(err.error_type(), "protocol");
/// assert!(err.to_string().contains("42"));
/// ```
#[derive(Debug, Error)]
pub enum CodecError {
    /// Frame layout error.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Tag or payload interpretation error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Transport I/O error surfaced through the decoder.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Stream ended mid-frame.
    #[error("EOF: {0}")]
    Eof(#[from] EofError),
}

impl CodecError {
    /// Category label used in logs and metrics.
    ///
    /// One of `"framing"`, `"protocol"`, `"io"`, or `"eof"`.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Framing(_) => "framing",
            Self::Protocol(_) => "protocol",
            Self::Io(_) => "io",
            Self::Eof(_) => "eof",
        }
    }

    /// Whether the connection that produced this error must be dropped.
    ///
    /// Always `true`: frame boundaries cannot be recovered mid-stream.
    #[must_use]
    #[expect(
        clippy::unused_self,
        reason = "kept as a method so callers need not know the variants"
    )]
    pub fn should_disconnect(&self) -> bool { true }
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => e,
            CodecError::Framing(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            CodecError::Protocol(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            CodecError::Eof(e) => io::Error::new(io::ErrorKind::UnexpectedEof, e),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
