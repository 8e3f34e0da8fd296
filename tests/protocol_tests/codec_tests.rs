//! Codec Tests
//!
//! Tests for the frame layout and message encoding/decoding.

use std::io::Cursor;
use dax::protocol::{
    decode, encode, peek_header, read_message, write_message, Decoded, Field, Message, Operation,
    ProtocolError, Status, HEADER_SIZE, MAGIC, MAX_KEY_SIZE, MAX_VALUE_SIZE,
};
use dax::DaxError;

fn decode_one(bytes: &[u8]) -> (Message, usize) {
    match decode(bytes) {
        Decoded::Message(message, consumed) => (message, consumed),
        other => panic!("Expected a message, got {:?}", other),
    }
}

// =============================================================================
// Wire Layout Tests
// =============================================================================

#[test]
fn test_add_wire_layout() {
    let encoded = encode(&Message::add(b"k1".to_vec(), b"abc".to_vec())).unwrap();

    let mut expected = vec![
        0x43, 0x41, 0x43, 0x48, // magic
        0x01, // version
        0x01, // ADD
        0, 0, 0, 2, // key length
        0, 0, 0, 3, // value length
    ];
    expected.extend_from_slice(b"k1abc");

    assert_eq!(&encoded[..], &expected[..]);
}

#[test]
fn test_response_status_is_first_value_byte() {
    let encoded = encode(&Message::ok(b"k1".to_vec(), b"abc".to_vec())).unwrap();

    assert_eq!(encoded[5], 0x10);
    assert_eq!(&encoded[10..14], &[0, 0, 0, 4]);
    assert_eq!(encoded[HEADER_SIZE + 2], 0x00);
    assert_eq!(&encoded[HEADER_SIZE + 3..], b"abc");
}

#[test]
fn test_heartbeat_wire_layout() {
    let encoded = encode(&Message::heartbeat()).unwrap();

    assert_eq!(u32::from_be_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]), MAGIC);
    assert_eq!(encoded[5], 0x04);
    assert_eq!(&encoded[6..10], &[0, 0, 0, 9]);
    assert_eq!(&encoded[10..14], &[0, 0, 0, 0]);
    assert_eq!(&encoded[HEADER_SIZE..], b"heartbeat");
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_requests_round_trip() {
    let requests = [
        Message::add(b"user".to_vec(), b"alice".to_vec()),
        Message::get(b"user".to_vec()),
        Message::remove(b"user".to_vec()),
        Message::heartbeat(),
    ];

    for request in requests {
        let encoded = encode(&request).unwrap();
        let (decoded, consumed) = decode_one(&encoded);
        assert_eq!(decoded, request);
        assert_eq!(consumed, encoded.len());
    }
}

#[test]
fn test_replies_round_trip() {
    let replies = [
        Message::ok(b"user".to_vec(), b"alice".to_vec()),
        Message::not_found(b"user".to_vec()),
        Message::error(b"user".to_vec(), "Unsupported operation: 0x09"),
        Message::ok(b"heartbeat".to_vec(), Vec::new()),
    ];

    for reply in replies {
        let (decoded, _) = decode_one(&encode(&reply).unwrap());
        assert_eq!(decoded, reply);
    }
}

#[test]
fn test_empty_key_and_value() {
    let message = Message::get(Vec::new());
    let encoded = encode(&message).unwrap();
    assert_eq!(encoded.len(), HEADER_SIZE);

    let (decoded, consumed) = decode_one(&encoded);
    assert_eq!(decoded, message);
    assert_eq!(consumed, HEADER_SIZE);
}

#[test]
fn test_binary_key_survives() {
    let key = vec![0x00, 0xff, 0x10, 0x0a];
    let (decoded, _) = decode_one(&encode(&Message::get(key.clone())).unwrap());
    assert_eq!(decoded.key, key);
}

#[test]
fn test_decode_leaves_trailing_bytes() {
    let first = encode(&Message::get(b"a".to_vec())).unwrap();
    let second = encode(&Message::get(b"b".to_vec())).unwrap();
    let stream = [&first[..], &second[..]].concat();

    let (decoded, consumed) = decode_one(&stream);
    assert_eq!(decoded.key, b"a");
    assert_eq!(consumed, first.len());

    let (decoded, _) = decode_one(&stream[consumed..]);
    assert_eq!(decoded.key, b"b");
}

// =============================================================================
// Rejection Tests
// =============================================================================

#[test]
fn test_bad_magic_is_invalid() {
    let mut encoded = encode(&Message::get(b"k".to_vec())).unwrap().to_vec();
    encoded[0] = 0xde;

    assert!(matches!(
        decode(&encoded),
        Decoded::Invalid(ProtocolError::BadMagic(_))
    ));
    // A single wrong byte is enough
    assert!(matches!(
        decode(&encoded[..1]),
        Decoded::Invalid(ProtocolError::BadMagic(_))
    ));
}

#[test]
fn test_bad_version_is_invalid() {
    let mut encoded = encode(&Message::get(b"k".to_vec())).unwrap().to_vec();
    encoded[4] = 0x02;

    assert_eq!(
        decode(&encoded),
        Decoded::Invalid(ProtocolError::BadVersion(0x02))
    );
}

#[test]
fn test_oversized_lengths_are_invalid() {
    let mut header = encode(&Message::get(Vec::new())).unwrap().to_vec();
    header[6..10].copy_from_slice(&((MAX_KEY_SIZE + 1) as u32).to_be_bytes());

    assert_eq!(
        peek_header(&header),
        Err(ProtocolError::OversizedField {
            field: Field::Key,
            len: MAX_KEY_SIZE + 1,
            max: MAX_KEY_SIZE,
        })
    );

    // A negative 32-bit length reads as a huge unsigned one
    let mut header = encode(&Message::get(Vec::new())).unwrap().to_vec();
    header[10..14].copy_from_slice(&(-1i32).to_be_bytes());

    assert!(matches!(
        decode(&header),
        Decoded::Invalid(ProtocolError::OversizedField { field: Field::Value, .. })
    ));
}

#[test]
fn test_encode_rejects_oversized_value() {
    let message = Message::add(b"k".to_vec(), vec![0u8; MAX_VALUE_SIZE + 1]);

    assert!(matches!(
        encode(&message),
        Err(ProtocolError::OversizedField { field: Field::Value, .. })
    ));
}

#[test]
fn test_encode_rejects_status_op_value_without_status() {
    for operation in [Operation::Heartbeat, Operation::Response, Operation::Error] {
        let message = Message::request(operation, b"k".to_vec(), b"x".to_vec());
        assert_eq!(
            encode(&message),
            Err(ProtocolError::MissingStatus(operation))
        );
    }

    // Without a value there is nothing to mistake for a status byte
    let message = Message::request(Operation::Heartbeat, b"k".to_vec(), Vec::new());
    let (decoded, _) = decode_one(&encode(&message).unwrap());
    assert_eq!(decoded, message);

    let err: DaxError = ProtocolError::MissingStatus(Operation::Heartbeat).into();
    assert!(!err.is_disconnect());
}

#[test]
fn test_unknown_opcode_still_decodes() {
    let message = Message::request(Operation::Unknown(0x09), b"k".to_vec(), b"v".to_vec());
    let (decoded, _) = decode_one(&encode(&message).unwrap());

    assert_eq!(decoded.operation, Operation::Unknown(0x09));
    assert_eq!(decoded.status, None);
    assert_eq!(decoded.value, b"v");
}

#[test]
fn test_unknown_status_byte_is_preserved() {
    let mut encoded = encode(&Message::ok(b"k".to_vec(), Vec::new())).unwrap().to_vec();
    let last = encoded.len() - 1;
    encoded[last] = 0x7f;

    let (decoded, _) = decode_one(&encoded);
    assert_eq!(decoded.status, Some(Status::Unknown(0x7f)));
}

// =============================================================================
// Stream Helper Tests
// =============================================================================

#[test]
fn test_stream_write_read() {
    let mut buf = Vec::new();
    write_message(&mut buf, &Message::add(b"k".to_vec(), b"v".to_vec())).unwrap();
    write_message(&mut buf, &Message::heartbeat()).unwrap();

    let mut cursor = Cursor::new(buf);
    assert_eq!(
        read_message(&mut cursor).unwrap(),
        Message::add(b"k".to_vec(), b"v".to_vec())
    );
    assert_eq!(read_message(&mut cursor).unwrap(), Message::heartbeat());
}

#[test]
fn test_stream_read_truncated_frame() {
    let encoded = encode(&Message::add(b"key".to_vec(), b"value".to_vec())).unwrap();
    let mut cursor = Cursor::new(encoded[..encoded.len() - 2].to_vec());

    match read_message(&mut cursor) {
        Err(DaxError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
        other => panic!("Expected EOF, got {:?}", other),
    }
}
