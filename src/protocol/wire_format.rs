//! Wire format encoding and decoding.
//!
//! Implements the 8-byte header format:
//! ```text
//! ┌──────────┬──────────┐
//! │ Length   │ Type     │
//! │ 4 bytes  │ 4 bytes  │
//! │ uint32   │ uint32   │
//! └──────────┴──────────┘
//! ```
//!
//! Both fields are in host byte order, matching the reference clients which
//! write the header struct verbatim. The order never changes for the lifetime
//! of the process.

use crate::error::{BackdropError, Result};

/// Header size in bytes (fixed, exactly 8).
pub const HEADER_SIZE: usize = 8;

/// Default maximum accepted request payload (16 KiB).
///
/// Request payloads are paths, so anything larger is a misbehaving peer.
pub const DEFAULT_MAX_REQUEST_PAYLOAD: u32 = 16 * 1024;

/// Highest request payload limit a session accepts (64 KiB).
///
/// A payload is only read once the socket reports all of it queued, so the
/// limit must stay below the socket receive buffer or a legal frame stalls.
pub const MAX_REQUEST_PAYLOAD_CEILING: u32 = 64 * 1024;

/// Payload sent with every successful reply, NUL terminator included.
pub const REPLY_OK: &[u8] = b"OK\0";

/// Request kinds accepted by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum RequestKind {
    /// Make a path the active wallpaper.
    Set = 0,
    /// Decode (or revalidate) a path in the image cache.
    Load = 1,
    /// Drop every cached image.
    Flush = 2,
}

impl RequestKind {
    /// All request kinds, in wire order.
    pub const ALL: [RequestKind; 3] = [RequestKind::Set, RequestKind::Load, RequestKind::Flush];

    /// Lowercase name used in logs and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            RequestKind::Set => "set",
            RequestKind::Load => "load",
            RequestKind::Flush => "flush",
        }
    }
}

impl TryFrom<u32> for RequestKind {
    type Error = BackdropError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(RequestKind::Set),
            1 => Ok(RequestKind::Load),
            2 => Ok(RequestKind::Flush),
            other => Err(BackdropError::UnknownRequestType(other)),
        }
    }
}

impl From<RequestKind> for u32 {
    fn from(kind: RequestKind) -> Self {
        kind as u32
    }
}

/// Reply kinds sent by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ReplyKind {
    Success = 0,
    Failure = 1,
}

impl TryFrom<u32> for ReplyKind {
    type Error = BackdropError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(ReplyKind::Success),
            1 => Ok(ReplyKind::Failure),
            other => Err(BackdropError::UnknownReplyType(other)),
        }
    }
}

impl From<ReplyKind> for u32 {
    fn from(kind: ReplyKind) -> Self {
        kind as u32
    }
}

/// Decoded header from wire format.
///
/// `kind` is kept raw so the same header serves requests and replies; callers
/// validate it against [`RequestKind`] or [`ReplyKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Payload length in bytes.
    pub length: u32,
    /// Message type.
    pub kind: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(length: u32, kind: impl Into<u32>) -> Self {
        Self {
            length,
            kind: kind.into(),
        }
    }

    /// Encode header to bytes.
    ///
    /// # Example
    ///
    /// ```
    /// use backdrop::protocol::{Header, RequestKind, HEADER_SIZE};
    ///
    /// let header = Header::new(5, RequestKind::Set);
    /// assert_eq!(header.encode().len(), HEADER_SIZE);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.length.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.kind.to_ne_bytes());
        buf
    }

    /// Decode header from bytes.
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            length: u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]),
            kind: u32::from_ne_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }

    /// Validate an inbound request header.
    ///
    /// Checks:
    /// - Type is one of the request kinds
    /// - Payload length doesn't exceed max
    pub fn validate_request(&self, max_payload: u32) -> Result<RequestKind> {
        let kind = RequestKind::try_from(self.kind)?;

        if self.length > max_payload {
            return Err(BackdropError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                self.length, max_payload
            )));
        }

        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size_is_exactly_8() {
        assert_eq!(HEADER_SIZE, 8);
        assert_eq!(Header::new(0, RequestKind::Flush).encode().len(), 8);
    }

    #[test]
    fn test_header_uses_host_byte_order() {
        let header = Header::new(0x0102_0304, 0x0506_0708u32);
        let bytes = header.encode();

        assert_eq!(&bytes[0..4], &0x0102_0304u32.to_ne_bytes());
        assert_eq!(&bytes[4..8], &0x0506_0708u32.to_ne_bytes());
    }

    #[test]
    fn test_decode_too_short_buffer() {
        assert!(Header::decode(&[0u8; 7]).is_none());
    }

    #[test]
    fn test_request_kind_wire_values() {
        assert_eq!(u32::from(RequestKind::Set), 0);
        assert_eq!(u32::from(RequestKind::Load), 1);
        assert_eq!(u32::from(RequestKind::Flush), 2);
        assert_eq!(RequestKind::try_from(1).unwrap(), RequestKind::Load);
    }

    #[test]
    fn test_unknown_request_kind_rejected() {
        let err = RequestKind::try_from(3).unwrap_err();
        assert!(matches!(err, BackdropError::UnknownRequestType(3)));
    }

    #[test]
    fn test_reply_kind_wire_values() {
        assert_eq!(u32::from(ReplyKind::Success), 0);
        assert_eq!(u32::from(ReplyKind::Failure), 1);
        assert!(ReplyKind::try_from(7).is_err());
    }

    #[test]
    fn test_validate_request_payload_too_large() {
        let header = Header::new(1_000, RequestKind::Set);
        let result = header.validate_request(100);
        assert!(result.unwrap_err().to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_validate_request_unknown_type() {
        let header = Header::new(0, 0xFFu32);
        assert!(matches!(
            header.validate_request(DEFAULT_MAX_REQUEST_PAYLOAD),
            Err(BackdropError::UnknownRequestType(0xFF))
        ));
    }

    #[test]
    fn test_validate_request_ok() {
        let header = Header::new(12, RequestKind::Load);
        assert_eq!(
            header.validate_request(DEFAULT_MAX_REQUEST_PAYLOAD).unwrap(),
            RequestKind::Load
        );
    }
}
