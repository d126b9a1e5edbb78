//! Integration tests for stream framing
//!
//! These tests validate that the message codec splits frames out of the read
//! buffer without copying and leaves partial frames untouched.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::{Bytes, BytesMut};
use genl_control::core::codec::MessageCodec;
use genl_control::core::message::{Endpoint, Message, MessageBuffer, MessageHeader, FLAG_REQUEST};
use genl_control::error::ProtocolError;
use genl_control::service::RequestBuilder;
use genl_control::transport::FamilyId;
use tokio_util::codec::{Decoder, Encoder};

fn requests() -> RequestBuilder {
    RequestBuilder::new(FamilyId(0x11), 0)
}

#[test]
fn test_codec_decode_zero_copy_split() {
    let mut codec = MessageCodec;
    let bytes = requests().set_param_request(Endpoint::new(1, 1), 3).unwrap();

    let mut buffer = BytesMut::from(&bytes[..]);
    let start = buffer.as_ptr();

    let frame = codec
        .decode(&mut buffer)
        .expect("Failed to decode")
        .expect("Should have frame");

    // The frame is the front of the read buffer, not a copy of it
    assert_eq!(frame.as_ptr(), start);
    assert_eq!(&frame[..], &bytes[..]);
    assert!(buffer.is_empty());

    let message = Message::parse(&frame).unwrap();
    assert_eq!(message.header.sequence, 1);
}

#[test]
fn test_codec_partial_decode_preserves_buffer() {
    let mut codec = MessageCodec;

    let mut buffer = BytesMut::from(&[0x30, 0x00, 0x00][..]);
    assert!(codec.decode(&mut buffer).unwrap().is_none());
    assert_eq!(buffer.len(), 3);

    let bytes = requests().get_info_request(Endpoint::new(1, 1)).unwrap();
    let mut buffer = BytesMut::from(&bytes[..bytes.len() - 1]);
    assert!(codec.decode(&mut buffer).unwrap().is_none());
    assert_eq!(buffer.len(), bytes.len() - 1);
}

#[test]
fn test_codec_encode_is_passthrough() {
    let mut codec = MessageCodec;
    let bytes = requests().get_info_request(Endpoint::new(1, 2)).unwrap();

    let mut buffer = BytesMut::new();
    codec.encode(bytes.clone(), &mut buffer).expect("Failed to encode");
    assert_eq!(buffer.freeze(), bytes);
}

#[test]
fn test_codec_multiple_frames_in_buffer() {
    let mut codec = MessageCodec;
    let first = requests().get_info_request(Endpoint::new(1, 1)).unwrap();
    let second = requests().set_param_request(Endpoint::new(1, 2), 0).unwrap();

    let mut buffer = BytesMut::new();
    buffer.extend_from_slice(&first);
    buffer.extend_from_slice(&second);

    let decoded1 = codec.decode(&mut buffer).unwrap().expect("Should have frame");
    let decoded2 = codec.decode(&mut buffer).unwrap().expect("Should have frame");
    assert_eq!(&decoded1[..], &first[..]);
    assert_eq!(&decoded2[..], &second[..]);
    assert!(codec.decode(&mut buffer).unwrap().is_none());
    assert_eq!(buffer.len(), 0);
}

#[test]
fn test_codec_rejects_bad_lengths() {
    let mut codec = MessageCodec;

    let mut short = BytesMut::from(&8u32.to_le_bytes()[..]);
    assert!(matches!(
        codec.decode(&mut short),
        Err(ProtocolError::Invalid(_))
    ));

    let mut huge = BytesMut::from(&(1u32 << 20).to_le_bytes()[..]);
    assert!(matches!(
        codec.decode(&mut huge),
        Err(ProtocolError::OversizedMessage(_))
    ));

    let mut out = BytesMut::new();
    assert!(matches!(
        codec.encode(Bytes::from(vec![0u8; 70_000]), &mut out),
        Err(ProtocolError::OversizedMessage(70_000))
    ));
}

#[test]
fn test_codec_frames_header_only_message() {
    let mut codec = MessageCodec;
    let header = MessageHeader::new(0x11, 1, 0, Endpoint::new(1, 1), FLAG_REQUEST);
    let bytes = MessageBuffer::new(header, 64).unwrap().finish();
    assert_eq!(bytes.len(), 20);

    let mut buffer = BytesMut::from(&bytes[..]);
    let frame = codec.decode(&mut buffer).unwrap().unwrap();
    assert!(Message::parse(&frame).unwrap().payload.is_empty());
}

#[test]
fn test_bytes_freeze_is_zero_copy() {
    let mut buffer = BytesMut::with_capacity(100);
    buffer.extend_from_slice(&[1, 2, 3, 4, 5]);

    let ptr_before = buffer.as_ptr();
    let frozen = buffer.freeze();
    assert_eq!(frozen.as_ptr(), ptr_before);
}
