//! Engine Module
//!
//! The in-memory cache and the command dispatch in front of it.
//!
//! ## Responsibilities
//! - Own the key-value map
//! - Turn each decoded request into exactly one response frame
//! - Answer unsupported operations with an ERROR frame instead of failing
//!   the connection

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::protocol::{Command, Message, HEARTBEAT_TOKEN};

/// The cache engine
///
/// ## Concurrency Model
///
/// Single-key operations take the map lock once and are atomic. `dump`
/// holds the read lock only while copying entries out; a concurrent `put`
/// may land before or after it.
pub struct Engine {
    data: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl Engine {
    /// Create an empty engine
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    // =========================================================================
    // Map Operations
    // =========================================================================

    /// Get a value by key
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.read().get(key).cloned()
    }

    /// Insert or replace a value
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) {
        self.data.write().insert(key, value);
    }

    /// Remove a key, returning its value
    pub fn remove(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.write().remove(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// All entries sorted by key, one `key: value` line each
    pub fn dump(&self) -> Option<Vec<u8>> {
        let mut entries: Vec<(Vec<u8>, Vec<u8>)> = self
            .data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if entries.is_empty() {
            return None;
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = Vec::new();
        for (i, (key, value)) in entries.iter().enumerate() {
            if i > 0 {
                out.push(b'\n');
            }
            out.extend_from_slice(key);
            out.extend_from_slice(b": ");
            out.extend_from_slice(value);
        }
        Some(out)
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Handle one request frame and build its reply
    pub fn handle(&self, request: Message) -> Message {
        let key = request.key.clone();
        match Command::from_message(request) {
            Ok(command) => self.execute(command),
            Err(operation) => {
                tracing::debug!("Unsupported operation {}", operation);
                Message::error(
                    key,
                    &format!("Unsupported operation: 0x{:02x}", operation.as_byte()),
                )
            }
        }
    }

    /// Execute a command against the cache
    pub fn execute(&self, command: Command) -> Message {
        match command {
            Command::Add { key, value } => {
                tracing::trace!("Added key '{}' ({} bytes)", String::from_utf8_lossy(&key), value.len());
                self.put(key.clone(), value);
                Message::ok(key, Vec::new())
            }
            Command::Get { key } => match self.get(&key) {
                Some(value) => Message::ok(key, value),
                None => Message::not_found(key),
            },
            Command::GetAll { key } => match self.dump() {
                Some(all) => Message::ok(key, all),
                None => Message::not_found(key),
            },
            Command::Remove { key } => match self.remove(&key) {
                Some(_) => Message::ok(key, Vec::new()),
                None => Message::not_found(key),
            },
            Command::Heartbeat => Message::ok(HEARTBEAT_TOKEN.as_bytes().to_vec(), Vec::new()),
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
