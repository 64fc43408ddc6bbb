//! Message-tag catalog and wire constants.
//!
//! Every frame on the wire carries a one-byte tag naming the protobuf message
//! type of its payload. The catalog mirrors the full tag space of the
//! connection protocol, but only a subset of the kinds can be decoded by this
//! crate; the rest are reported as unknown.

use std::fmt;

/// Current protocol version sent in the login frame.
pub const MCS_VERSION: u8 = 41;

/// Older protocol version still accepted from the server.
pub const LEGACY_MCS_VERSION: u8 = 38;

/// Length of the version field that prefixes the first frame.
pub const VERSION_PACKET_LEN: usize = 1;

/// Length of the tag field.
pub const TAG_PACKET_LEN: usize = 1;

/// Minimum length of the size varint.
pub const SIZE_PACKET_LEN_MIN: usize = 1;

/// Maximum length of the size varint. A 32-bit varint never needs more.
pub const SIZE_PACKET_LEN_MAX: usize = 5;

/// Returns true when `version` may open a stream.
#[must_use]
pub fn is_supported_version(version: u8) -> bool {
    version >= MCS_VERSION || version == LEGACY_MCS_VERSION
}

/// Tags understood by the frame decoder.
///
/// # Examples
///
/// ```
/// use pushframe::tag::MessageTag;
///
/// assert_eq!(MessageTag::try_from(8), Ok(MessageTag::DataMessageStanza));
/// assert!(MessageTag::try_from(5).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageTag {
    HeartbeatPing = 0,
    HeartbeatAck = 1,
    LoginRequest = 2,
    LoginResponse = 3,
    Close = 4,
    IqStanza = 7,
    DataMessageStanza = 8,
    StreamErrorStanza = 10,
}

impl MessageTag {
    /// All decodable tags in wire order.
    pub const ALL: [MessageTag; 8] = [
        MessageTag::HeartbeatPing,
        MessageTag::HeartbeatAck,
        MessageTag::LoginRequest,
        MessageTag::LoginResponse,
        MessageTag::Close,
        MessageTag::IqStanza,
        MessageTag::DataMessageStanza,
        MessageTag::StreamErrorStanza,
    ];

    /// Raw wire value of this tag.
    #[must_use]
    pub const fn as_u8(self) -> u8 { self as u8 }

    /// Protobuf type name carried under this tag.
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::HeartbeatPing => "mcs_proto.HeartbeatPing",
            Self::HeartbeatAck => "mcs_proto.HeartbeatAck",
            Self::LoginRequest => "mcs_proto.LoginRequest",
            Self::LoginResponse => "mcs_proto.LoginResponse",
            Self::Close => "mcs_proto.Close",
            Self::IqStanza => "mcs_proto.IqStanza",
            Self::DataMessageStanza => "mcs_proto.DataMessageStanza",
            Self::StreamErrorStanza => "mcs_proto.StreamErrorStanza",
        }
    }
}

/// Error returned when a byte is not a decodable tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown message tag: {0}")]
pub struct UnknownTag(pub u8);

impl TryFrom<u8> for MessageTag {
    type Error = UnknownTag;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_u8() == value)
            .ok_or(UnknownTag(value))
    }
}

impl From<MessageTag> for u8 {
    fn from(tag: MessageTag) -> Self { tag.as_u8() }
}

impl fmt::Display for MessageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.type_name(), self.as_u8())
    }
}
