//! Transport capability
//!
//! The narrow set of socket operations a [`Connection`](super::Connection)
//! needs. The event loops hand it real non-blocking TCP streams; tests hand
//! it in-memory streams.

use std::io::{self, Read, Write};
use std::net::Shutdown;

/// A non-blocking byte stream
///
/// `read` and `write` must return `WouldBlock` instead of blocking, and
/// `read` returns `0` once the peer has closed.
pub trait Transport: Read + Write {
    /// Human-readable peer identity for logging
    fn peer_label(&self) -> String;

    /// Close both directions
    fn shutdown(&self) -> io::Result<()>;
}

impl Transport for mio::net::TcpStream {
    fn peer_label(&self) -> String {
        self.peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    fn shutdown(&self) -> io::Result<()> {
        mio::net::TcpStream::shutdown(self, Shutdown::Both)
    }
}
