//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ```text
//! ┌───────────┬─────────┬────────┬────────────┬──────────────┐
//! │ Magic (4) │ Ver (1) │ Op (1) │ KeyLen (4) │ ValueLen (4) │  key bytes, value bytes
//! └───────────┴─────────┴────────┴────────────┴──────────────┘
//! ```
//!
//! Decoding never consumes input it cannot fully parse: a short buffer
//! yields [`Decoded::Incomplete`] no matter how often it is retried.

use std::io::{self, ErrorKind, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use super::{
    Field, Message, Operation, ProtocolError, Status, HEADER_SIZE, MAGIC, MAX_KEY_SIZE,
    MAX_VALUE_SIZE, VERSION,
};
use crate::error::Result;

/// Outcome of one decode attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// More bytes are needed; nothing was consumed
    Incomplete,

    /// A full frame, with the number of bytes it occupied
    Message(Message, usize),

    /// The stream is corrupt
    Invalid(ProtocolError),
}

/// A validated frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub operation: Operation,
    pub key_len: usize,
    pub value_len: usize,
}

impl Header {
    /// Size of the whole frame this header announces
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.key_len + self.value_len
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a message to bytes
pub fn encode(message: &Message) -> std::result::Result<Bytes, ProtocolError> {
    let mut dst = BytesMut::with_capacity(message.encoded_len());
    encode_into(message, &mut dst)?;
    Ok(dst.freeze())
}

/// Append the encoding of `message` to `dst`
///
/// Nothing is written when a field is oversized, or when a status-bearing
/// message has a value but no status.
pub fn encode_into(message: &Message, dst: &mut BytesMut) -> std::result::Result<(), ProtocolError> {
    let key_len = message.key.len();
    let value_len = message.wire_value_len();

    if message.operation.carries_status() && message.status.is_none() && !message.value.is_empty()
    {
        return Err(ProtocolError::MissingStatus(message.operation));
    }

    if key_len > MAX_KEY_SIZE {
        return Err(ProtocolError::OversizedField {
            field: Field::Key,
            len: key_len,
            max: MAX_KEY_SIZE,
        });
    }
    if value_len > MAX_VALUE_SIZE {
        return Err(ProtocolError::OversizedField {
            field: Field::Value,
            len: value_len,
            max: MAX_VALUE_SIZE,
        });
    }

    dst.reserve(HEADER_SIZE + key_len + value_len);
    dst.put_u32(MAGIC);
    dst.put_u8(VERSION);
    dst.put_u8(message.operation.as_byte());
    dst.put_u32(key_len as u32);
    dst.put_u32(value_len as u32);
    dst.put_slice(&message.key);
    if let Some(status) = message.wire_status() {
        dst.put_u8(status.as_byte());
    }
    dst.put_slice(&message.value);

    Ok(())
}

// =============================================================================
// Decoding
// =============================================================================

/// Validate whatever part of the header is present
///
/// Magic and version are checked byte by byte, so a corrupt stream is
/// rejected as soon as its first wrong byte arrives. Lengths are read as
/// unsigned, so a negative 32-bit length shows up as oversized.
pub fn peek_header(bytes: &[u8]) -> std::result::Result<Option<Header>, ProtocolError> {
    let magic = MAGIC.to_be_bytes();
    let seen = bytes.len().min(magic.len());
    if bytes[..seen] != magic[..seen] {
        let mut raw = [0u8; 4];
        raw[..seen].copy_from_slice(&bytes[..seen]);
        return Err(ProtocolError::BadMagic(u32::from_be_bytes(raw)));
    }

    if bytes.len() > 4 && bytes[4] != VERSION {
        return Err(ProtocolError::BadVersion(bytes[4]));
    }

    if bytes.len() < HEADER_SIZE {
        return Ok(None);
    }

    let operation = Operation::from_byte(bytes[5]);
    let key_len = u32::from_be_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]) as usize;
    let value_len = u32::from_be_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]) as usize;

    if key_len > MAX_KEY_SIZE {
        return Err(ProtocolError::OversizedField {
            field: Field::Key,
            len: key_len,
            max: MAX_KEY_SIZE,
        });
    }
    if value_len > MAX_VALUE_SIZE {
        return Err(ProtocolError::OversizedField {
            field: Field::Value,
            len: value_len,
            max: MAX_VALUE_SIZE,
        });
    }

    Ok(Some(Header {
        operation,
        key_len,
        value_len,
    }))
}

/// Try to decode one message from the front of `bytes`
pub fn decode(bytes: &[u8]) -> Decoded {
    let header = match peek_header(bytes) {
        Ok(Some(header)) => header,
        Ok(None) => return Decoded::Incomplete,
        Err(e) => return Decoded::Invalid(e),
    };

    let total_len = header.frame_len();
    if bytes.len() < total_len {
        return Decoded::Incomplete;
    }

    let key_end = HEADER_SIZE + header.key_len;
    let key = bytes[HEADER_SIZE..key_end].to_vec();
    let raw_value = &bytes[key_end..total_len];

    // Split the leading status byte off status-bearing operations
    let (status, value) = match raw_value.split_first() {
        Some((&status, rest)) if header.operation.carries_status() => {
            (Some(Status::from_byte(status)), rest.to_vec())
        }
        _ => (None, raw_value.to_vec()),
    };

    let message = Message {
        operation: header.operation,
        status,
        key,
        value,
    };

    Decoded::Message(message, total_len)
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete message from a blocking stream
pub fn read_message<R: Read>(reader: &mut R) -> Result<Message> {
    let mut header_bytes = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header_bytes)?;

    let Some(header) = peek_header(&header_bytes)? else {
        return Err(io::Error::from(ErrorKind::UnexpectedEof).into());
    };

    let mut frame = Vec::with_capacity(header.frame_len());
    frame.extend_from_slice(&header_bytes);
    frame.resize(header.frame_len(), 0);
    reader.read_exact(&mut frame[HEADER_SIZE..])?;

    match decode(&frame) {
        Decoded::Message(message, _) => Ok(message),
        Decoded::Invalid(e) => Err(e.into()),
        Decoded::Incomplete => Err(io::Error::from(ErrorKind::UnexpectedEof).into()),
    }
}

/// Write a message to a blocking stream
pub fn write_message<W: Write>(writer: &mut W, message: &Message) -> Result<()> {
    let bytes = encode(message)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
