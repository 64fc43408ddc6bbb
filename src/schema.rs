//! Process-wide protocol schema.
//!
//! The schema maps every decodable [`MessageTag`] to a decoding routine and
//! knows how to frame outbound messages. It is built once per process and
//! handed out as an [`Arc`], so the parser and the login-frame builder share
//! a single instance. Requesting it again is cheap and always returns the
//! same table.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, OnceLock},
};

use bytes::{BufMut, BytesMut};
use prost::Message;

use crate::{
    message::McsMessage,
    proto,
    tag::{MCS_VERSION, MessageTag},
};

type DecodeFn = fn(&[u8]) -> Result<McsMessage, prost::DecodeError>;

/// Decoder table and frame writer for the connection protocol.
pub struct ProtocolSchema {
    decoders: HashMap<MessageTag, DecodeFn>,
}

impl fmt::Debug for ProtocolSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolSchema")
            .field("tags", &self.decoders.len())
            .finish()
    }
}

fn decode_as<M>(bytes: &[u8]) -> Result<McsMessage, prost::DecodeError>
where
    M: Message + Default + Into<McsMessage>,
{
    M::decode(bytes).map(Into::into)
}

impl ProtocolSchema {
    fn build() -> Self {
        let table: [(MessageTag, DecodeFn); 8] = [
            (MessageTag::HeartbeatPing, decode_as::<proto::HeartbeatPing>),
            (MessageTag::HeartbeatAck, decode_as::<proto::HeartbeatAck>),
            (MessageTag::LoginRequest, decode_as::<proto::LoginRequest>),
            (MessageTag::LoginResponse, decode_as::<proto::LoginResponse>),
            (MessageTag::Close, decode_as::<proto::Close>),
            (MessageTag::IqStanza, decode_as::<proto::IqStanza>),
            (
                MessageTag::DataMessageStanza,
                decode_as::<proto::DataMessageStanza>,
            ),
            (
                MessageTag::StreamErrorStanza,
                decode_as::<proto::StreamErrorStanza>,
            ),
        ];
        let decoders: HashMap<MessageTag, DecodeFn> = table.into_iter().collect();
        tracing::debug!(tags = decoders.len(), "protocol schema loaded");
        Self { decoders }
    }

    /// Return the process-wide schema, building it on first use.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use pushframe::schema::ProtocolSchema;
    ///
    /// let a = ProtocolSchema::shared();
    /// let b = ProtocolSchema::shared();
    /// assert!(Arc::ptr_eq(&a, &b));
    /// ```
    #[must_use]
    pub fn shared() -> Arc<Self> {
        static SCHEMA: OnceLock<Arc<ProtocolSchema>> = OnceLock::new();
        Arc::clone(SCHEMA.get_or_init(|| Arc::new(Self::build())))
    }

    /// Whether a decoder is registered for `tag`.
    #[must_use]
    pub fn knows(&self, tag: MessageTag) -> bool { self.decoders.contains_key(&tag) }

    /// Decode `payload` as the message type registered for `tag`.
    ///
    /// An empty payload yields the default value of the message type.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownTag`] if no decoder exists for `tag`, or
    /// [`SchemaError::Decode`] if the payload is not valid protobuf.
    pub fn decode(&self, tag: MessageTag, payload: &[u8]) -> Result<McsMessage, SchemaError> {
        let decode = self
            .decoders
            .get(&tag)
            .ok_or(SchemaError::UnknownTag(tag))?;
        decode(payload).map_err(|source| SchemaError::Decode { tag, source })
    }

    /// Write `[tag][size varint][payload]` for `message` into `dst`.
    pub fn write_frame(&self, message: &McsMessage, dst: &mut BytesMut) {
        let len = message.encoded_len();
        dst.reserve(1 + prost::length_delimiter_len(len) + len);
        dst.put_u8(message.tag().as_u8());
        // Writing into a `BytesMut` cannot run out of capacity.
        let _ = prost::encode_length_delimiter(len, dst);
        dst.put_slice(&message.encode_payload());
    }

    /// Build the complete login frame: version byte, login tag, then the
    /// length-delimited request.
    #[must_use]
    pub fn login_frame(&self, request: &proto::LoginRequest) -> BytesMut {
        let len = request.encoded_len();
        let mut dst = BytesMut::with_capacity(2 + prost::length_delimiter_len(len) + len);
        dst.put_u8(MCS_VERSION);
        dst.put_u8(MessageTag::LoginRequest.as_u8());
        // Writing into a `BytesMut` cannot run out of capacity.
        let _ = request.encode_length_delimited(&mut dst);
        dst
    }
}

/// Errors raised while decoding a payload through the schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// No decoder is registered for the tag.
    #[error("no decoder registered for {0}")]
    UnknownTag(MessageTag),
    /// The payload bytes are not a valid encoding of the tag's type.
    #[error("malformed {tag} payload: {source}")]
    Decode {
        /// Tag whose decoder rejected the payload.
        tag: MessageTag,
        /// Underlying protobuf error.
        #[source]
        source: prost::DecodeError,
    },
}
