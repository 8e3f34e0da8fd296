//! Response definitions
//!
//! Status codes and constructors for server replies.

use std::fmt;

use super::{Message, Operation};

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
    Error,
    /// Status byte this version does not recognize
    Unknown(u8),
}

impl Status {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Status::Ok,
            0x01 => Status::NotFound,
            0x02 => Status::Error,
            other => Status::Unknown(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Status::Ok => 0x00,
            Status::NotFound => 0x01,
            Status::Error => 0x02,
            Status::Unknown(byte) => byte,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => f.write_str("OK"),
            Status::NotFound => f.write_str("NOT_FOUND"),
            Status::Error => f.write_str("ERROR"),
            Status::Unknown(byte) => write!(f, "UNKNOWN(0x{:02x})", byte),
        }
    }
}

impl Message {
    /// Create a RESPONSE with an explicit status
    pub fn response(status: Status, key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            operation: Operation::Response,
            status: Some(status),
            key,
            value,
        }
    }

    /// Create an OK response carrying `value`
    pub fn ok(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self::response(Status::Ok, key, value)
    }

    /// Create a NOT_FOUND response
    pub fn not_found(key: Vec<u8>) -> Self {
        Self::response(Status::NotFound, key, Vec::new())
    }

    /// Create an ERROR frame describing a failure
    pub fn error(key: Vec<u8>, message: &str) -> Self {
        Self {
            operation: Operation::Error,
            status: Some(Status::Error),
            key,
            value: message.as_bytes().to_vec(),
        }
    }
}
