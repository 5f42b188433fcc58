//! Bounded outbound reply buffer.
//!
//! Replies are appended as complete frames and drained across however many
//! writable signals the socket needs. The buffer starts unallocated, is
//! allocated at an initial capacity on first use and doubles from there, but
//! never past its configured maximum: a peer that stops reading cannot make
//! the daemon grow without bound.
//!
//! # Example
//!
//! ```
//! use backdrop::protocol::{ReplyKind, HEADER_SIZE};
//! use backdrop::session::ReplyBuffer;
//!
//! let mut buffer = ReplyBuffer::new(1024, 16 * 1024);
//! buffer.enqueue(ReplyKind::Success, b"OK").unwrap();
//! assert_eq!(buffer.len(), HEADER_SIZE + 2);
//! assert_eq!(buffer.capacity(), 1024);
//! ```

use std::io;

use bytes::{Buf, BytesMut};

use crate::error::{BackdropError, Result};
use crate::protocol::{Header, ReplyKind, HEADER_SIZE};
use crate::transport::Transport;

/// Capacity allocated on the first enqueue (1 KiB).
pub const DEFAULT_INITIAL_REPLY_CAPACITY: usize = 1024;

/// Ceiling on buffered reply bytes per connection (16 KiB).
pub const DEFAULT_MAX_REPLY_BUFFER: usize = 16 * 1024;

/// Result of one writable signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Nothing was buffered.
    Idle,
    /// Wrote this many bytes; the rest stays buffered.
    Wrote(usize),
    /// The socket would block; retry on the next writable signal.
    Blocked,
}

/// Growable reply buffer with a doubling-with-cap policy.
#[derive(Debug)]
pub struct ReplyBuffer {
    /// Unallocated until the first reply.
    buffer: Option<BytesMut>,
    /// Logical capacity under the doubling policy (0 while unallocated).
    capacity: usize,
    initial_capacity: usize,
    max_capacity: usize,
}

impl ReplyBuffer {
    /// Create an unallocated buffer.
    ///
    /// An initial capacity above the maximum is clamped to the maximum.
    pub fn new(initial_capacity: usize, max_capacity: usize) -> Self {
        Self {
            buffer: None,
            capacity: 0,
            initial_capacity: initial_capacity.clamp(1, max_capacity.max(1)),
            max_capacity,
        }
    }

    /// Append one reply frame (header then payload).
    ///
    /// # Errors
    ///
    /// Returns [`BackdropError::ReplyTooLarge`] when the frame does not fit
    /// under the maximum capacity. Already buffered bytes are left untouched.
    pub fn enqueue(&mut self, kind: ReplyKind, payload: &[u8]) -> Result<()> {
        let needed = self.len() + HEADER_SIZE + payload.len();
        let capacity = self.grown_capacity(needed)?;

        let buffer = self
            .buffer
            .get_or_insert_with(|| BytesMut::with_capacity(capacity));
        if capacity > buffer.capacity() {
            buffer.reserve(capacity - buffer.len());
        }
        self.capacity = capacity;

        let header = Header::new(payload.len() as u32, kind);
        buffer.extend_from_slice(&header.encode());
        buffer.extend_from_slice(payload);
        Ok(())
    }

    /// Capacity that fits `needed` bytes, doubling from the current one.
    fn grown_capacity(&self, needed: usize) -> Result<usize> {
        let mut capacity = if self.capacity == 0 {
            self.initial_capacity
        } else {
            self.capacity
        };

        while capacity < needed {
            match capacity.checked_mul(2) {
                Some(doubled) if doubled <= self.max_capacity => capacity = doubled,
                _ => {
                    return Err(BackdropError::ReplyTooLarge {
                        needed,
                        max: self.max_capacity,
                    })
                }
            }
        }

        Ok(capacity)
    }

    /// Attempt a single non-blocking write of everything buffered.
    ///
    /// A short write removes exactly the written prefix.
    ///
    /// # Errors
    ///
    /// Any transport error other than would-block or interruption.
    pub fn flush<T: Transport>(&mut self, transport: &mut T) -> Result<WriteOutcome> {
        let buffer = match self.buffer.as_mut() {
            Some(b) if !b.is_empty() => b,
            _ => return Ok(WriteOutcome::Idle),
        };

        match transport.write(&buffer[..]) {
            Ok(0) => Err(BackdropError::Io(io::Error::new(
                io::ErrorKind::WriteZero,
                "socket accepted zero bytes",
            ))),
            Ok(n) => {
                buffer.advance(n);
                Ok(WriteOutcome::Wrote(n))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(WriteOutcome::Blocked),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(WriteOutcome::Wrote(0)),
            Err(e) => Err(e.into()),
        }
    }

    /// Bytes waiting to be written.
    pub fn pending(&self) -> &[u8] {
        self.buffer.as_deref().unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Logical capacity; 0 until the first reply is enqueued.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }
}

impl Default for ReplyBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_REPLY_CAPACITY, DEFAULT_MAX_REPLY_BUFFER)
    }
}
