//! Frame codec for the connection protocol.
//!
//! The wire format is a sequence of frames:
//!
//! ```text
//! [version (first frame only)] [tag: u8] [size: varint] [payload: size bytes]
//! ```
//!
//! [`McsDecoder`] is an incremental state machine that reconstructs frames
//! from an arbitrarily chunked byte stream. It plugs into
//! [`tokio_util::codec::FramedRead`] for socket use, and [`StreamParser`]
//! wraps it for callers that push bytes by hand.
//!
//! # Error Handling
//!
//! Any [`CodecError`] leaves the decoder unusable: once a frame boundary is
//! lost the stream cannot be resynchronised, so the connection must be
//! replaced.

use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{
    message::McsMessage,
    schema::{ProtocolSchema, SchemaError},
    tag::{
        MessageTag,
        SIZE_PACKET_LEN_MIN,
        TAG_PACKET_LEN,
        VERSION_PACKET_LEN,
        is_supported_version,
    },
};

pub mod error;
mod varint;

pub use error::{CodecError, EofError, FramingError, ProtocolError};
use varint::{SizeRead, read_size};

/// Minimum accepted value for the maximum payload length.
pub const MIN_FRAME_LENGTH: usize = 64;

/// Maximum accepted value for the maximum payload length (16 MiB).
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

pub(crate) fn clamp_frame_length(value: usize) -> usize {
    value.clamp(MIN_FRAME_LENGTH, MAX_FRAME_LENGTH)
}

/// Position of the decoder within the current frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParserState {
    /// Waiting for the version byte, tag, and first size byte of the opening
    /// frame.
    AwaitingVersionTagAndSize,
    /// Waiting for the tag and first size byte of a frame.
    AwaitingTagAndSize,
    /// The size varint was cut short; waiting for more of it.
    AwaitingRemainingSizeBytes,
    /// Size known; waiting for the full payload.
    AwaitingPayloadBytes,
}

/// Factory for matching decoder and encoder instances.
///
/// # Examples
///
/// ```
/// use bytes::BytesMut;
/// use pushframe::{codec::McsCodec, message::McsMessage, proto};
/// use tokio_util::codec::{Decoder, Encoder};
///
/// let codec = McsCodec::default();
/// let mut wire = BytesMut::from(&[pushframe::tag::MCS_VERSION][..]);
/// codec
///     .encoder()
///     .encode(McsMessage::HeartbeatPing(proto::HeartbeatPing::default()), &mut wire)
///     .expect("encode ping");
///
/// let decoded = codec.decoder().decode(&mut wire).expect("decode ping");
/// assert!(matches!(decoded, Some(McsMessage::HeartbeatPing(_))));
/// ```
#[derive(Clone, Debug)]
pub struct McsCodec {
    schema: Arc<ProtocolSchema>,
    max_frame_length: usize,
}

impl McsCodec {
    /// Construct a codec with a maximum payload length.
    #[must_use]
    pub fn new(schema: Arc<ProtocolSchema>, max_frame_length: usize) -> Self {
        Self {
            schema,
            max_frame_length: clamp_frame_length(max_frame_length),
        }
    }

    /// Return the maximum payload length accepted by this codec.
    #[must_use]
    pub fn max_frame_length(&self) -> usize { self.max_frame_length }

    /// Decoder expecting the version byte in front of the first frame.
    #[must_use]
    pub fn decoder(&self) -> McsDecoder {
        McsDecoder::new(Arc::clone(&self.schema), self.max_frame_length)
    }

    /// Encoder writing tag-prefixed frames without a version byte.
    #[must_use]
    pub fn encoder(&self) -> McsEncoder {
        McsEncoder {
            schema: Arc::clone(&self.schema),
        }
    }
}

impl Default for McsCodec {
    fn default() -> Self { Self::new(ProtocolSchema::shared(), MAX_FRAME_LENGTH) }
}

/// Incremental frame decoder.
#[derive(Debug)]
pub struct McsDecoder {
    schema: Arc<ProtocolSchema>,
    max_frame_length: usize,
    state: ParserState,
    tag: MessageTag,
    size: usize,
    size_bytes_so_far: usize,
}

impl McsDecoder {
    fn new(schema: Arc<ProtocolSchema>, max_frame_length: usize) -> Self {
        Self {
            schema,
            max_frame_length,
            state: ParserState::AwaitingVersionTagAndSize,
            tag: MessageTag::HeartbeatPing,
            size: 0,
            size_bytes_so_far: 0,
        }
    }

    /// Current state of the frame state machine.
    #[must_use]
    pub fn state(&self) -> ParserState { self.state }

    fn min_bytes_needed(&self) -> usize {
        match self.state {
            ParserState::AwaitingVersionTagAndSize => {
                VERSION_PACKET_LEN + TAG_PACKET_LEN + SIZE_PACKET_LEN_MIN
            }
            ParserState::AwaitingTagAndSize => TAG_PACKET_LEN + SIZE_PACKET_LEN_MIN,
            ParserState::AwaitingRemainingSizeBytes => self.size_bytes_so_far + 1,
            ParserState::AwaitingPayloadBytes => self.size,
        }
    }

    fn on_version(&mut self, src: &mut BytesMut) -> Result<(), CodecError> {
        let version = src.get_u8();
        if !is_supported_version(version) {
            return Err(FramingError::UnsupportedVersion { version }.into());
        }
        tracing::trace!(version, "protocol version accepted");
        self.state = ParserState::AwaitingTagAndSize;
        Ok(())
    }

    fn on_tag(&mut self, src: &mut BytesMut) -> Result<(), CodecError> {
        let raw = src.get_u8();
        self.tag = MessageTag::try_from(raw)
            .map_err(|_| ProtocolError::UnknownMessageTag { tag: raw })?;
        self.size_bytes_so_far = 0;
        self.state = ParserState::AwaitingRemainingSizeBytes;
        Ok(())
    }

    /// Returns a message when the frame turns out to be empty.
    fn on_size(&mut self, src: &mut BytesMut) -> Result<Option<McsMessage>, CodecError> {
        match read_size(src)? {
            SizeRead::Truncated { consumed } => {
                tracing::trace!(consumed, "size varint incomplete");
                self.size_bytes_so_far = consumed;
                self.state = ParserState::AwaitingRemainingSizeBytes;
                Ok(None)
            }
            SizeRead::Complete { size, len } => {
                src.advance(len);
                if size > self.max_frame_length {
                    return Err(FramingError::OversizedFrame {
                        size,
                        max: self.max_frame_length,
                    }
                    .into());
                }
                self.size_bytes_so_far = 0;
                self.size = size;
                if size == 0 {
                    return self.finish(&[]).map(Some);
                }
                self.state = ParserState::AwaitingPayloadBytes;
                Ok(None)
            }
        }
    }

    fn finish(&mut self, payload: &[u8]) -> Result<McsMessage, CodecError> {
        let message = self
            .schema
            .decode(self.tag, payload)
            .map_err(|err| match err {
                SchemaError::UnknownTag(tag) => ProtocolError::UnknownMessageTag { tag: tag.as_u8() },
                SchemaError::Decode { tag, source } => ProtocolError::MalformedPayload {
                    tag,
                    reason: source.to_string(),
                },
            })?;
        tracing::trace!(tag = %self.tag, size = self.size, "frame decoded");
        self.size = 0;
        self.state = ParserState::AwaitingTagAndSize;
        Ok(message)
    }
}

impl Decoder for McsDecoder {
    type Item = McsMessage;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if src.len() < self.min_bytes_needed() {
                return Ok(None);
            }
            match self.state {
                ParserState::AwaitingVersionTagAndSize => self.on_version(src)?,
                ParserState::AwaitingTagAndSize => {
                    self.on_tag(src)?;
                    if let Some(message) = self.on_size(src)? {
                        return Ok(Some(message));
                    }
                }
                ParserState::AwaitingRemainingSizeBytes => {
                    if let Some(message) = self.on_size(src)? {
                        return Ok(Some(message));
                    }
                }
                ParserState::AwaitingPayloadBytes => {
                    let payload = src.split_to(self.size);
                    return self.finish(&payload).map(Some);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(message) = self.decode(src)? {
            return Ok(Some(message));
        }
        let at_boundary = matches!(
            self.state,
            ParserState::AwaitingVersionTagAndSize | ParserState::AwaitingTagAndSize
        );
        if at_boundary && src.is_empty() {
            return Ok(None);
        }
        Err(match self.state {
            ParserState::AwaitingPayloadBytes => EofError::MidFrame {
                bytes_received: src.len(),
                expected: self.size,
            },
            _ => EofError::MidHeader {
                bytes_received: src.len(),
            },
        }
        .into())
    }
}

/// Frame encoder for outbound messages after the login frame.
#[derive(Clone, Debug)]
pub struct McsEncoder {
    schema: Arc<ProtocolSchema>,
}

impl Encoder<McsMessage> for McsEncoder {
    type Error = CodecError;

    fn encode(&mut self, item: McsMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.schema.write_frame(&item, dst);
        Ok(())
    }
}

/// Event produced by [`StreamParser::feed`].
#[derive(Debug)]
pub enum ParserEvent {
    /// A complete frame was decoded.
    Message(McsMessage),
    /// The stream is corrupt; the parser accepts no further input.
    Error(CodecError),
}

/// Push-style wrapper around [`McsDecoder`].
///
/// Bytes are appended to an internal backlog and every complete frame is
/// returned as a [`ParserEvent::Message`]. After the first
/// [`ParserEvent::Error`] the parser discards all further input.
///
/// # Examples
///
/// ```
/// use pushframe::codec::{ParserEvent, StreamParser};
///
/// let mut parser = StreamParser::default();
/// // Version 41, then a heartbeat ping (tag 0) with an empty payload.
/// assert!(parser.feed(&[41, 0]).is_empty());
/// let events = parser.feed(&[0]);
/// assert!(matches!(events.as_slice(), [ParserEvent::Message(_)]));
/// ```
#[derive(Debug)]
pub struct StreamParser {
    decoder: McsDecoder,
    backlog: BytesMut,
    failed: bool,
}

impl StreamParser {
    /// Create a parser that expects the version byte first.
    #[must_use]
    pub fn new(codec: &McsCodec) -> Self {
        Self {
            decoder: codec.decoder(),
            backlog: BytesMut::new(),
            failed: false,
        }
    }

    /// Append `bytes` and decode as many frames as are complete.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ParserEvent> {
        let mut events = Vec::new();
        if self.failed {
            return events;
        }
        self.backlog.extend_from_slice(bytes);
        loop {
            match self.decoder.decode(&mut self.backlog) {
                Ok(Some(message)) => events.push(ParserEvent::Message(message)),
                Ok(None) => break,
                Err(err) => {
                    self.failed = true;
                    self.backlog.clear();
                    events.push(ParserEvent::Error(err));
                    break;
                }
            }
        }
        events
    }

    /// Current state of the underlying state machine.
    #[must_use]
    pub fn state(&self) -> ParserState { self.decoder.state() }

    /// Whether the parser has reported an error.
    #[must_use]
    pub fn is_failed(&self) -> bool { self.failed }

    /// Bytes buffered but not yet consumed by a complete frame.
    #[must_use]
    pub fn buffered(&self) -> usize { self.backlog.len() }
}

impl Default for StreamParser {
    fn default() -> Self { Self::new(&McsCodec::default()) }
}

#[cfg(test)]
mod tests;
