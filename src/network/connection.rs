//! Connection Handler
//!
//! One non-blocking byte stream plus its reassembly buffer.

use std::io::{self, ErrorKind};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::Result;
use crate::protocol::{encode, FrameBuffer, Message};

use super::Transport;

/// Pause between write attempts while the socket is full
const WRITE_RETRY_PAUSE: Duration = Duration::from_micros(200);

/// Result of one read from the socket
#[derive(Debug)]
pub enum ReadOutcome {
    /// Bytes arrived; these frames completed (possibly none)
    Messages(Vec<Message>),

    /// Nothing more to read until the next readiness event
    Drained,

    /// The peer closed the stream
    Closed,
}

/// Handles a single connection
pub struct Connection<S: Transport> {
    /// Underlying non-blocking stream
    stream: S,

    /// Partial frames carried across reads
    frames: FrameBuffer,

    /// How long a single frame may take to flush
    write_timeout: Duration,

    /// Peer address for logging
    peer_addr: String,
}

impl<S: Transport> Connection<S> {
    /// Wrap a stream with buffers sized from `config`
    pub fn new(stream: S, config: &Config) -> Self {
        let peer_addr = stream.peer_label();
        Self {
            stream,
            frames: FrameBuffer::new(config.read_buffer_size, config.max_frame_size),
            write_timeout: config.write_timeout(),
            peer_addr,
        }
    }

    /// Read once and decode whatever frames completed
    ///
    /// Callers drain a readiness event by calling this until it returns
    /// [`ReadOutcome::Drained`] or [`ReadOutcome::Closed`]. A protocol
    /// violation is returned as an error; the connection is unusable after it.
    pub fn read_batch(&mut self) -> Result<ReadOutcome> {
        match self.frames.read_from(&mut self.stream) {
            Ok(0) => {
                if !self.frames.is_empty() {
                    tracing::debug!(
                        "{} closed with {} bytes of an unfinished frame",
                        self.peer_addr,
                        self.frames.len()
                    );
                }
                Ok(ReadOutcome::Closed)
            }
            Ok(_) => Ok(ReadOutcome::Messages(self.frames.drain()?)),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(ReadOutcome::Drained),
            Err(e) => Err(e.into()),
        }
    }

    /// Encode and send a message
    ///
    /// An oversized message fails before anything is written, leaving the
    /// connection usable.
    pub fn send(&mut self, message: &Message) -> Result<()> {
        let frame = encode(message)?;
        self.write_frame(&frame)
    }

    /// Write an encoded frame, retrying until every byte is accepted
    ///
    /// Blocks the calling thread while the socket is full, up to the write
    /// timeout.
    pub fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        let deadline = Instant::now() + self.write_timeout;
        let mut written = 0;

        while written < frame.len() {
            match self.stream.write(&frame[written..]) {
                Ok(0) => return Err(io::Error::from(ErrorKind::WriteZero).into()),
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(io::Error::new(
                            ErrorKind::TimedOut,
                            format!(
                                "flushed {} of {} bytes to {} before timing out",
                                written,
                                frame.len(),
                                self.peer_addr
                            ),
                        )
                        .into());
                    }
                    thread::sleep(WRITE_RETRY_PAUSE);
                }
                Err(e) => return Err(e.into()),
            }
        }

        match self.stream.flush() {
            Err(e) if e.kind() != ErrorKind::WouldBlock => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Shut the stream down, ignoring errors from an already-dead socket
    pub fn close(&mut self) {
        let _ = self.stream.shutdown();
        self.frames.clear();
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }
}
