//! Decoded protocol messages.
//!
//! [`McsMessage`] pairs each decodable [`MessageTag`] with its protobuf body,
//! so consumers can match on the kind without carrying the tag separately.

use prost::Message;

use crate::{proto, tag::MessageTag};

/// A single decoded frame.
#[derive(Clone, Debug, PartialEq)]
pub enum McsMessage {
    HeartbeatPing(proto::HeartbeatPing),
    HeartbeatAck(proto::HeartbeatAck),
    LoginRequest(proto::LoginRequest),
    LoginResponse(proto::LoginResponse),
    Close(proto::Close),
    IqStanza(proto::IqStanza),
    DataMessageStanza(proto::DataMessageStanza),
    StreamErrorStanza(proto::StreamErrorStanza),
}

impl McsMessage {
    /// Tag written in front of this message on the wire.
    #[must_use]
    pub fn tag(&self) -> MessageTag {
        match self {
            Self::HeartbeatPing(_) => MessageTag::HeartbeatPing,
            Self::HeartbeatAck(_) => MessageTag::HeartbeatAck,
            Self::LoginRequest(_) => MessageTag::LoginRequest,
            Self::LoginResponse(_) => MessageTag::LoginResponse,
            Self::Close(_) => MessageTag::Close,
            Self::IqStanza(_) => MessageTag::IqStanza,
            Self::DataMessageStanza(_) => MessageTag::DataMessageStanza,
            Self::StreamErrorStanza(_) => MessageTag::StreamErrorStanza,
        }
    }

    /// Protobuf encoding of the body, without tag or length.
    #[must_use]
    pub fn encode_payload(&self) -> Vec<u8> {
        match self {
            Self::HeartbeatPing(m) => m.encode_to_vec(),
            Self::HeartbeatAck(m) => m.encode_to_vec(),
            Self::LoginRequest(m) => m.encode_to_vec(),
            Self::LoginResponse(m) => m.encode_to_vec(),
            Self::Close(m) => m.encode_to_vec(),
            Self::IqStanza(m) => m.encode_to_vec(),
            Self::DataMessageStanza(m) => m.encode_to_vec(),
            Self::StreamErrorStanza(m) => m.encode_to_vec(),
        }
    }

    /// Length of [`encode_payload`](Self::encode_payload) without allocating.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::HeartbeatPing(m) => m.encoded_len(),
            Self::HeartbeatAck(m) => m.encoded_len(),
            Self::LoginRequest(m) => m.encoded_len(),
            Self::LoginResponse(m) => m.encoded_len(),
            Self::Close(m) => m.encoded_len(),
            Self::IqStanza(m) => m.encoded_len(),
            Self::DataMessageStanza(m) => m.encoded_len(),
            Self::StreamErrorStanza(m) => m.encoded_len(),
        }
    }
}

macro_rules! impl_from_body {
    ($($variant:ident),+ $(,)?) => {
        $(
            impl From<proto::$variant> for McsMessage {
                fn from(body: proto::$variant) -> Self { Self::$variant(body) }
            }
        )+
    };
}

impl_from_body!(
    HeartbeatPing,
    HeartbeatAck,
    LoginRequest,
    LoginResponse,
    Close,
    IqStanza,
    DataMessageStanza,
    StreamErrorStanza,
);
