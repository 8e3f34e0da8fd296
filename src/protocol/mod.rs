//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Frame Format (big-endian)
//!
//! ```text
//! ┌───────────┬─────────┬────────┬────────────┬──────────────┬───────┬─────────┐
//! │ Magic (4) │ Ver (1) │ Op (1) │ KeyLen (4) │ ValueLen (4) │  Key  │  Value  │
//! └───────────┴─────────┴────────┴────────────┴──────────────┴───────┴─────────┘
//! ```
//!
//! ### Operations
//! - 0x01: ADD       - key + value
//! - 0x02: GET       - key
//! - 0x03: REMOVE    - key
//! - 0x04: HEARTBEAT - key `heartbeat`
//! - 0x10: RESPONSE  - status byte + value
//! - 0x11: ERROR     - status byte + message
//!
//! ### Status Codes
//! Carried as the first byte of the value for RESPONSE, ERROR and
//! HEARTBEAT replies.
//! - 0x00: OK
//! - 0x01: NOT_FOUND
//! - 0x02: ERROR

mod command;
mod response;
mod message;
mod codec;
mod frame_buffer;

use thiserror::Error;

pub use command::{Command, Operation};
pub use response::Status;
pub use message::{Message, HEARTBEAT_TOKEN};
pub use codec::{
    decode, encode, encode_into, peek_header, read_message, write_message, Decoded, Header,
};
pub use frame_buffer::FrameBuffer;

/// "CACH" in ASCII
pub const MAGIC: u32 = 0x4341_4348;

/// Protocol version byte
pub const VERSION: u8 = 0x01;

/// Header size: magic (4) + version (1) + op (1) + key len (4) + value len (4)
pub const HEADER_SIZE: usize = 14;

/// Maximum key size (1 MB)
pub const MAX_KEY_SIZE: usize = 1024 * 1024;

/// Maximum value size on the wire, status byte included (16 MB)
pub const MAX_VALUE_SIZE: usize = 16 * 1024 * 1024;

/// Length-prefixed fields of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Key,
    Value,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Key => f.write_str("key"),
            Field::Value => f.write_str("value"),
        }
    }
}

/// Violations of the framing rules
///
/// When raised while decoding, the stream cannot be resynchronized and the
/// connection must be closed. `OversizedField` and `MissingStatus` raised
/// while encoding only fail the one request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Invalid magic number: 0x{0:08x}")]
    BadMagic(u32),

    #[error("Unsupported protocol version: {0}")]
    BadVersion(u8),

    #[error("{field} length {len} exceeds maximum of {max} bytes")]
    OversizedField { field: Field, len: usize, max: usize },

    #[error("Frame of {len} bytes exceeds the connection limit of {max} bytes")]
    FrameTooLarge { len: usize, max: usize },

    /// The value would be read back as a status byte
    #[error("{0} with a value must carry a status")]
    MissingStatus(Operation),
}
