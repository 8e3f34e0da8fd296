//! Message definition
//!
//! The unit of protocol exchange, shared by requests and replies.

use std::borrow::Cow;
use std::fmt;

use super::{Operation, Status, HEADER_SIZE};

/// Key carried by heartbeat requests and replies
pub const HEARTBEAT_TOKEN: &str = "heartbeat";

/// One logical protocol message
///
/// `status` is only meaningful for operations that carry one
/// (see [`Operation::carries_status`]); on the wire it travels as the first
/// byte of the value, and `value` here is everything after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub operation: Operation,
    pub status: Option<Status>,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Message {
    /// Create an ADD request
    pub fn add(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self::request(Operation::Add, key, value)
    }

    /// Create a GET request
    pub fn get(key: Vec<u8>) -> Self {
        Self::request(Operation::Get, key, Vec::new())
    }

    /// Create a REMOVE request
    pub fn remove(key: Vec<u8>) -> Self {
        Self::request(Operation::Remove, key, Vec::new())
    }

    /// Create a HEARTBEAT request
    pub fn heartbeat() -> Self {
        Self::request(
            Operation::Heartbeat,
            HEARTBEAT_TOKEN.as_bytes().to_vec(),
            Vec::new(),
        )
    }

    /// Create a request with an arbitrary operation code
    pub fn request(operation: Operation, key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            operation,
            status: None,
            key,
            value,
        }
    }

    /// Correlation token: the key as text
    pub fn token(&self) -> String {
        String::from_utf8_lossy(&self.key).into_owned()
    }

    pub fn key_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.key)
    }

    pub fn value_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }

    /// Status byte actually written for this message, if any
    pub(crate) fn wire_status(&self) -> Option<Status> {
        if self.operation.carries_status() {
            self.status
        } else {
            None
        }
    }

    /// Value length as declared in the header
    pub fn wire_value_len(&self) -> usize {
        self.value.len() + usize::from(self.wire_status().is_some())
    }

    /// Total encoded size of this message
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.key.len() + self.wire_value_len()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operation)?;
        if let Some(status) = self.status {
            write!(f, " [{}]", status)?;
        }
        write!(f, " key='{}'", self.key_str())?;
        if self.value.len() < 100 {
            write!(f, " value='{}'", self.value_str())
        } else {
            write!(f, " value=<{} bytes>", self.value.len())
        }
    }
}
