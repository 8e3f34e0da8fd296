//! Reassembly Tests
//!
//! Feeding the frame buffer the way a socket would: split, merged and
//! interleaved with garbage.

use std::io::Cursor;
use dax::protocol::{encode, FrameBuffer, Message, ProtocolError, HEADER_SIZE};

const STEADY: usize = 1024;
const LIMIT: usize = 64 * 1024;

fn stream_of(messages: &[Message]) -> Vec<u8> {
    messages
        .iter()
        .flat_map(|m| encode(m).unwrap().to_vec())
        .collect()
}

fn requests() -> Vec<Message> {
    vec![
        Message::add(b"k1".to_vec(), b"first".to_vec()),
        Message::get(b"k1".to_vec()),
        Message::heartbeat(),
        Message::remove(b"k1".to_vec()),
    ]
}

#[test]
fn test_every_split_point_yields_same_messages() {
    let expected = requests();
    let stream = stream_of(&expected);

    for split in 0..=stream.len() {
        let mut frames = FrameBuffer::new(STEADY, LIMIT);
        let mut decoded = frames.push(&stream[..split]).unwrap();
        decoded.extend(frames.push(&stream[split..]).unwrap());

        assert_eq!(decoded, expected, "split at {}", split);
        assert!(frames.is_empty());
    }
}

#[test]
fn test_read_from_reader_in_chunks() {
    let expected = requests();
    let mut reader = Cursor::new(stream_of(&expected));
    let mut frames = FrameBuffer::new(STEADY, LIMIT);

    let mut decoded = Vec::new();
    while frames.read_from(&mut reader).unwrap() > 0 {
        decoded.extend(frames.drain().unwrap());
    }

    assert_eq!(decoded, expected);
}

#[test]
fn test_header_only_waits_for_body() {
    let encoded = encode(&Message::add(b"key".to_vec(), b"value".to_vec())).unwrap();
    let mut frames = FrameBuffer::new(STEADY, LIMIT);

    assert!(frames.push(&encoded[..HEADER_SIZE]).unwrap().is_empty());
    assert_eq!(frames.len(), HEADER_SIZE);

    let decoded = frames.push(&encoded[HEADER_SIZE..]).unwrap();
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].value, b"value");
}

#[test]
fn test_large_value_across_many_reads() {
    let value = vec![0xab; 3 * STEADY];
    let message = Message::add(b"big".to_vec(), value.clone());
    let stream = stream_of(&[message]);
    let mut frames = FrameBuffer::new(STEADY, LIMIT);

    let mut decoded = Vec::new();
    for chunk in stream.chunks(100) {
        decoded.extend(frames.push(chunk).unwrap());
    }

    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].value, value);
    assert!(frames.is_empty());
}

#[test]
fn test_garbage_after_valid_frame() {
    let mut stream = stream_of(&[Message::get(b"ok".to_vec())]);
    stream.extend_from_slice(b"GET ok\n");

    let mut frames = FrameBuffer::new(STEADY, LIMIT);
    frames.extend(&stream);

    assert_eq!(frames.next_message().unwrap(), Some(Message::get(b"ok".to_vec())));
    assert!(matches!(
        frames.next_message(),
        Err(ProtocolError::BadMagic(_))
    ));
}

#[test]
fn test_announced_frame_over_limit() {
    let message = Message::add(b"k".to_vec(), vec![0u8; 2 * STEADY]);
    let encoded = encode(&message).unwrap();
    let mut frames = FrameBuffer::new(STEADY, STEADY);

    assert!(matches!(
        frames.push(&encoded[..HEADER_SIZE]),
        Err(ProtocolError::FrameTooLarge { .. })
    ));
}
