//! Frame buffer for accumulating partial reads.
//!
//! Each connection owns one. Bytes are appended as they arrive and complete
//! frames are decoded off the front, so a single read may yield zero, one or
//! several messages, always in arrival order. Consumed bytes are released as
//! soon as a frame is decoded; only the tail of an unfinished frame is kept
//! between reads.
//!
//! The buffer normally stays at its steady capacity. Once a header announces
//! a frame bigger than that, exactly the missing room is reserved, and the
//! buffer drops back to its steady size after the frame is consumed.

use std::io::{self, ErrorKind, Read};

use bytes::{Buf, BytesMut};

use super::codec::{self, Decoded};
use super::{Message, ProtocolError};

/// Size of a single socket read
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Per-connection reassembly buffer
pub struct FrameBuffer {
    /// Unconsumed bytes received so far
    buffer: BytesMut,

    /// Capacity the buffer returns to when idle
    steady_capacity: usize,

    /// Largest frame this connection accepts
    max_frame_size: usize,

    /// Scratch space for socket reads
    chunk: Box<[u8]>,
}

impl FrameBuffer {
    /// Create a buffer with the given steady capacity and frame limit
    pub fn new(steady_capacity: usize, max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(steady_capacity),
            steady_capacity,
            max_frame_size,
            chunk: vec![0u8; READ_CHUNK_SIZE.min(steady_capacity.max(1))].into_boxed_slice(),
        }
    }

    /// Append bytes and decode every complete frame now available
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Message>, ProtocolError> {
        self.extend(data);
        self.drain()
    }

    /// Append bytes without decoding
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Decode every complete frame currently buffered
    pub fn drain(&mut self) -> Result<Vec<Message>, ProtocolError> {
        let mut messages = Vec::new();
        while let Some(message) = self.next_message()? {
            messages.push(message);
        }
        Ok(messages)
    }

    /// Decode the next frame, if one is complete
    pub fn next_message(&mut self) -> Result<Option<Message>, ProtocolError> {
        match codec::decode(&self.buffer) {
            Decoded::Message(message, consumed) => {
                self.buffer.advance(consumed);
                self.compact();
                Ok(Some(message))
            }
            Decoded::Incomplete => {
                self.reserve_for_pending()?;
                Ok(None)
            }
            Decoded::Invalid(e) => Err(e),
        }
    }

    /// Perform one read from `src` into the buffer
    ///
    /// Returns the number of bytes read; `0` means the peer closed the
    /// stream. `WouldBlock` is passed through to the caller.
    pub fn read_from<R: Read>(&mut self, src: &mut R) -> io::Result<usize> {
        loop {
            match src.read(&mut self.chunk) {
                Ok(n) => {
                    self.buffer.extend_from_slice(&self.chunk[..n]);
                    return Ok(n);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Get the number of buffered bytes
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Current allocated capacity
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.buffer = BytesMut::with_capacity(self.steady_capacity);
    }

    /// Make room for the rest of a frame whose header is already buffered
    fn reserve_for_pending(&mut self) -> Result<(), ProtocolError> {
        let Some(header) = codec::peek_header(&self.buffer)? else {
            return Ok(());
        };

        let frame_len = header.frame_len();
        if frame_len > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                len: frame_len,
                max: self.max_frame_size,
            });
        }

        let missing = frame_len - self.buffer.len();
        self.buffer.reserve(missing);
        Ok(())
    }

    /// Give back memory grown for an oversized frame
    fn compact(&mut self) {
        if self.buffer.is_empty() && self.buffer.capacity() > self.steady_capacity {
            self.buffer = BytesMut::with_capacity(self.steady_capacity);
        }
    }
}
