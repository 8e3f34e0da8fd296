//! Command definitions
//!
//! Operation codes on the wire and the requests the server understands.

use std::fmt;

use super::Message;

/// Operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Add,
    Get,
    Remove,
    Heartbeat,
    Response,
    Error,
    /// Any code this version does not know. Decoding it is not a framing
    /// error; the server answers with an ERROR frame.
    Unknown(u8),
}

impl Operation {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x01 => Operation::Add,
            0x02 => Operation::Get,
            0x03 => Operation::Remove,
            0x04 => Operation::Heartbeat,
            0x10 => Operation::Response,
            0x11 => Operation::Error,
            other => Operation::Unknown(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Operation::Add => 0x01,
            Operation::Get => 0x02,
            Operation::Remove => 0x03,
            Operation::Heartbeat => 0x04,
            Operation::Response => 0x10,
            Operation::Error => 0x11,
            Operation::Unknown(byte) => byte,
        }
    }

    /// Whether the first value byte of this operation is a status code
    pub fn carries_status(self) -> bool {
        matches!(
            self,
            Operation::Response | Operation::Error | Operation::Heartbeat
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Add => f.write_str("ADD"),
            Operation::Get => f.write_str("GET"),
            Operation::Remove => f.write_str("REMOVE"),
            Operation::Heartbeat => f.write_str("HEARTBEAT"),
            Operation::Response => f.write_str("RESPONSE"),
            Operation::Error => f.write_str("ERROR"),
            Operation::Unknown(byte) => write!(f, "UNKNOWN(0x{:02x})", byte),
        }
    }
}

/// A request decoded from a client frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Store a key-value pair
    Add { key: Vec<u8>, value: Vec<u8> },

    /// Look up a key
    Get { key: Vec<u8> },

    /// Dump every entry (`GET ALL`); `key` is echoed back as sent
    GetAll { key: Vec<u8> },

    /// Remove a key
    Remove { key: Vec<u8> },

    /// Liveness check
    Heartbeat,
}

impl Command {
    /// Key that requests a full dump instead of a lookup
    pub const ALL_KEY: &'static [u8] = b"ALL";

    /// Interpret a request frame.
    ///
    /// Returns the operation back when it is not something a client may ask
    /// the server to do.
    pub fn from_message(message: Message) -> Result<Self, Operation> {
        match message.operation {
            Operation::Add => Ok(Command::Add {
                key: message.key,
                value: message.value,
            }),
            Operation::Get if message.key.eq_ignore_ascii_case(Self::ALL_KEY) => {
                Ok(Command::GetAll { key: message.key })
            }
            Operation::Get => Ok(Command::Get { key: message.key }),
            Operation::Remove => Ok(Command::Remove { key: message.key }),
            Operation::Heartbeat => Ok(Command::Heartbeat),
            other => Err(other),
        }
    }
}
