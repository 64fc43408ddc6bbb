//! Unit tests for the frame decoder state machine.

use bytes::BytesMut;
use prost::Message;
use rstest::rstest;
use tokio_util::codec::{Decoder, Encoder};

use super::*;
use crate::{
    proto,
    tag::{LEGACY_MCS_VERSION, MCS_VERSION},
};

fn frame(tag: MessageTag, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![tag.as_u8()];
    prost::encode_length_delimiter(payload.len(), &mut out).expect("vec grows");
    out.extend_from_slice(payload);
    out
}

fn stanza(persistent_id: &str) -> proto::DataMessageStanza {
    proto::DataMessageStanza {
        from: "sender".into(),
        category: "org.chromium.linux".into(),
        persistent_id: Some(persistent_id.into()),
        app_data: vec![proto::AppData::new("subtype", "wp:test")],
        ..Default::default()
    }
}

fn large_stanza(persistent_id: &str) -> proto::DataMessageStanza {
    proto::DataMessageStanza {
        raw_data: Some(vec![0x5a; 200]),
        ..stanza(persistent_id)
    }
}

fn messages(events: Vec<ParserEvent>) -> Vec<McsMessage> {
    events
        .into_iter()
        .map(|event| match event {
            ParserEvent::Message(message) => message,
            ParserEvent::Error(err) => panic!("unexpected parser error: {err}"),
        })
        .collect()
}

#[test]
fn codec_clamps_max_frame_length() {
    let codec = McsCodec::new(ProtocolSchema::shared(), MAX_FRAME_LENGTH.saturating_add(1));
    assert_eq!(codec.max_frame_length(), MAX_FRAME_LENGTH);
    let codec = McsCodec::new(ProtocolSchema::shared(), 1);
    assert_eq!(codec.max_frame_length(), MIN_FRAME_LENGTH);
}

#[test]
fn parser_waits_for_version_tag_and_size() {
    let mut parser = StreamParser::default();
    assert!(parser.feed(&[MCS_VERSION]).is_empty());
    assert!(parser.feed(&[MessageTag::Close.as_u8()]).is_empty());
    assert_eq!(parser.state(), ParserState::AwaitingVersionTagAndSize);

    let decoded = messages(parser.feed(&[0]));
    assert_eq!(decoded, vec![McsMessage::Close(proto::Close::default())]);
    assert_eq!(parser.state(), ParserState::AwaitingTagAndSize);
    assert_eq!(parser.buffered(), 0);
}

#[rstest]
#[case(MessageTag::HeartbeatPing)]
#[case(MessageTag::HeartbeatAck)]
#[case(MessageTag::LoginResponse)]
#[case(MessageTag::Close)]
#[case(MessageTag::DataMessageStanza)]
fn zero_length_frames_decode_to_default_bodies(#[case] tag: MessageTag) {
    let mut parser = StreamParser::default();
    let mut wire = vec![MCS_VERSION];
    wire.extend(frame(tag, &[]));

    let decoded = messages(parser.feed(&wire));
    let expected = ProtocolSchema::shared()
        .decode(tag, &[])
        .expect("default body");
    assert_eq!(decoded, vec![expected]);
}

#[test]
fn version_byte_is_only_read_once() {
    let mut parser = StreamParser::default();
    let mut wire = vec![MCS_VERSION];
    wire.extend(frame(MessageTag::HeartbeatPing, &[]));
    wire.extend(frame(MessageTag::HeartbeatPing, &[]));

    let decoded = messages(parser.feed(&wire));
    assert_eq!(decoded.len(), 2);
}

#[test]
fn legacy_version_is_accepted() {
    let mut parser = StreamParser::default();
    let mut wire = vec![LEGACY_MCS_VERSION];
    wire.extend(frame(MessageTag::HeartbeatAck, &[]));
    assert_eq!(messages(parser.feed(&wire)).len(), 1);
}

#[test]
fn old_version_is_rejected() {
    let mut parser = StreamParser::default();
    let mut wire = vec![MCS_VERSION - 1];
    wire.extend(frame(MessageTag::HeartbeatAck, &[]));

    let events = parser.feed(&wire);
    assert!(matches!(
        events.as_slice(),
        [ParserEvent::Error(CodecError::Framing(
            FramingError::UnsupportedVersion { version: 40 }
        ))]
    ));
    assert!(parser.is_failed());
}

#[test]
fn truncated_size_varint_resumes_with_identical_size() {
    let payload = large_stanza("0:1700000000000000%7031b2e6f9fd7ecd").encode_to_vec();
    assert!(payload.len() > 127, "payload must need a two byte varint");
    let mut whole = vec![MCS_VERSION];
    whole.extend(frame(MessageTag::DataMessageStanza, &payload));

    // Split right after the first size byte.
    let (head, tail) = whole.split_at(3);
    let mut parser = StreamParser::default();
    assert!(parser.feed(head).is_empty());
    assert_eq!(parser.state(), ParserState::AwaitingRemainingSizeBytes);
    let chunked = messages(parser.feed(tail));

    let mut parser = StreamParser::default();
    let direct = messages(parser.feed(&whole));

    assert_eq!(chunked, direct);
    assert_eq!(
        chunked,
        vec![McsMessage::DataMessageStanza(large_stanza(
            "0:1700000000000000%7031b2e6f9fd7ecd"
        ))]
    );
}

#[test]
fn payload_waits_until_fully_buffered() {
    let payload = stanza("0:1").encode_to_vec();
    let mut wire = vec![MCS_VERSION];
    wire.extend(frame(MessageTag::DataMessageStanza, &payload));
    let split = wire.len() - 1;

    let mut parser = StreamParser::default();
    assert!(parser.feed(wire.get(..split).expect("head")).is_empty());
    assert_eq!(parser.state(), ParserState::AwaitingPayloadBytes);
    assert_eq!(
        messages(parser.feed(wire.get(split..).expect("tail"))).len(),
        1
    );
}

#[test]
fn unknown_tag_yields_one_error_and_nothing_after() {
    let mut parser = StreamParser::default();
    let mut wire = vec![MCS_VERSION, 5, 0];
    wire.extend(frame(MessageTag::HeartbeatPing, &[]));

    let events = parser.feed(&wire);
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events.first(),
        Some(ParserEvent::Error(CodecError::Protocol(
            ProtocolError::UnknownMessageTag { tag: 5 }
        )))
    ));
    assert!(parser.feed(&frame(MessageTag::HeartbeatPing, &[])).is_empty());
    assert_eq!(parser.buffered(), 0);
}

#[test]
fn malformed_payload_is_fatal() {
    let mut parser = StreamParser::default();
    let mut wire = vec![MCS_VERSION];
    // Field 1, length-delimited, claims 16 bytes but carries one.
    wire.extend(frame(MessageTag::LoginResponse, &[0x0a, 0x10, b'x']));

    let events = parser.feed(&wire);
    assert!(matches!(
        events.as_slice(),
        [ParserEvent::Error(CodecError::Protocol(
            ProtocolError::MalformedPayload {
                tag: MessageTag::LoginResponse,
                ..
            }
        ))]
    ));
}

#[test]
fn oversized_payload_is_rejected_before_buffering() {
    let codec = McsCodec::new(ProtocolSchema::shared(), MIN_FRAME_LENGTH);
    let mut decoder = codec.decoder();
    let mut wire = BytesMut::from(&[MCS_VERSION, MessageTag::DataMessageStanza.as_u8()][..]);
    prost::encode_length_delimiter(MIN_FRAME_LENGTH + 1, &mut wire).expect("bytes grows");

    let err = decoder.decode(&mut wire).expect_err("size above max");
    assert!(matches!(
        err,
        CodecError::Framing(FramingError::OversizedFrame { size, max })
            if size == MIN_FRAME_LENGTH + 1 && max == MIN_FRAME_LENGTH
    ));
}

#[test]
fn overlong_size_varint_is_rejected() {
    let mut parser = StreamParser::default();
    let events = parser.feed(&[MCS_VERSION, 0, 0x80, 0x80, 0x80, 0x80, 0x80]);
    assert!(matches!(
        events.as_slice(),
        [ParserEvent::Error(CodecError::Framing(
            FramingError::InvalidLengthEncoding
        ))]
    ));
}

#[test]
fn decode_eof_at_frame_boundary_is_clean() {
    let mut decoder = McsCodec::default().decoder();
    let mut buf = BytesMut::new();
    assert!(matches!(decoder.decode_eof(&mut buf), Ok(None)));
}

#[rstest]
#[case::mid_header(vec![MCS_VERSION, 0], "header")]
#[case::mid_payload(vec![MCS_VERSION, 8, 10, 1, 2], "10 byte payload")]
fn decode_eof_inside_a_frame_fails(#[case] bytes: Vec<u8>, #[case] expected: &str) {
    let mut decoder = McsCodec::default().decoder();
    let mut buf = BytesMut::from(bytes.as_slice());
    let err = decoder.decode_eof(&mut buf).expect_err("partial frame");
    assert!(
        err.to_string().contains(expected),
        "error should mention '{expected}', got: {err}"
    );
}

#[test]
fn encoder_output_is_readable_after_version_byte() {
    let codec = McsCodec::default();
    let mut wire = BytesMut::from(&[MCS_VERSION][..]);
    let ack = McsMessage::HeartbeatAck(proto::HeartbeatAck {
        stream_id: Some(3),
        ..Default::default()
    });
    codec
        .encoder()
        .encode(ack.clone(), &mut wire)
        .expect("encode ack");

    let decoded = codec
        .decoder()
        .decode(&mut wire)
        .expect("decode ack")
        .expect("complete frame");
    assert_eq!(decoded, ack);
    assert!(wire.is_empty());
}
