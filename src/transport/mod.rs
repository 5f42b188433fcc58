//! Transport module - the byte stream under a session.
//!
//! Provides:
//! - [`Transport`] - non-blocking read/write with a peek-size query
//! - [`SocketListener`] / [`SocketTransport`] - Unix domain socket implementation
//! - [`MemoryTransport`] - scripted in-memory implementation

mod memory;
mod socket;

pub use memory::MemoryTransport;
pub use socket::{
    default_socket_path, resolve_socket_path, runtime_dir, SocketDiscriminator, SocketListener,
    SocketTransport, APP_NAME,
};

use std::io;

/// Non-blocking byte stream as seen by a [`Session`](crate::session::Session).
///
/// None of the methods may block. "Would block" is reported as
/// `io::ErrorKind::WouldBlock`.
pub trait Transport {
    /// Number of bytes that can be read right now without blocking.
    ///
    /// Returns `io::ErrorKind::UnexpectedEof` once the peer has closed and
    /// nothing is left to read.
    fn available(&mut self) -> io::Result<usize>;

    /// Read up to `buf.len()` bytes.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write a prefix of `buf`, returning how many bytes were accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn available(&mut self) -> io::Result<usize> {
        (**self).available()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }
}
