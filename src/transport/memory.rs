//! Scripted in-memory transport.
//!
//! Bytes are handed to the session only when the test delivers them, so
//! fragmented frames, short writes and would-block can be reproduced exactly.

use std::collections::VecDeque;
use std::io;

use super::Transport;

/// In-memory [`Transport`] for driving a session without a socket.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    closed: bool,
    write_limit: Option<usize>,
    write_blocked: bool,
    read_error: Option<io::ErrorKind>,
    write_error: Option<io::ErrorKind>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `bytes` available to the reader.
    pub fn deliver(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes);
    }

    /// Simulate the peer closing its end.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Delivered bytes not yet read.
    pub fn unread(&self) -> usize {
        self.inbound.len()
    }

    /// Accept at most `limit` bytes per write.
    pub fn set_write_limit(&mut self, limit: Option<usize>) {
        self.write_limit = limit;
    }

    /// Report would-block on every write while set.
    pub fn set_write_blocked(&mut self, blocked: bool) {
        self.write_blocked = blocked;
    }

    /// Fail every read and peek with `kind`.
    pub fn fail_reads(&mut self, kind: io::ErrorKind) {
        self.read_error = Some(kind);
    }

    /// Fail every write with `kind`.
    pub fn fail_writes(&mut self, kind: io::ErrorKind) {
        self.write_error = Some(kind);
    }

    /// Everything written so far.
    pub fn written(&self) -> &[u8] {
        &self.outbound
    }

    /// Take everything written so far.
    pub fn take_written(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outbound)
    }
}

impl Transport for MemoryTransport {
    fn available(&mut self) -> io::Result<usize> {
        if let Some(kind) = self.read_error {
            return Err(kind.into());
        }
        if self.inbound.is_empty() && self.closed {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        Ok(self.inbound.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(kind) = self.read_error {
            return Err(kind.into());
        }
        if self.inbound.is_empty() {
            return if self.closed {
                Ok(0)
            } else {
                Err(io::ErrorKind::WouldBlock.into())
            };
        }

        let n = buf.len().min(self.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(kind) = self.write_error {
            return Err(kind.into());
        }
        if self.write_blocked {
            return Err(io::ErrorKind::WouldBlock.into());
        }

        let n = self.write_limit.map_or(buf.len(), |limit| limit.min(buf.len()));
        self.outbound.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}
