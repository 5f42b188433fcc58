//! Complete request and reply frames.
//!
//! Uses `bytes::Bytes` for payloads so a completed request can be handed to
//! a handler without copying.
//!
//! # Example
//!
//! ```
//! use backdrop::protocol::{build_frame, Header, RequestKind, HEADER_SIZE};
//!
//! let header = Header::new(5, RequestKind::Set);
//! let bytes = build_frame(&header, b"a.png");
//! assert_eq!(bytes.len(), HEADER_SIZE + 5);
//! ```

use bytes::Bytes;

use super::wire_format::{Header, ReplyKind, RequestKind, HEADER_SIZE};
use crate::error::{BackdropError, Result};

/// A fully received request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Validated request kind.
    pub kind: RequestKind,
    /// Payload bytes, exactly `header.length` long.
    pub payload: Bytes,
}

impl Request {
    pub fn new(kind: RequestKind, payload: Bytes) -> Self {
        Self { kind, payload }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Encode the request as it travels on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`BackdropError::Protocol`] if the payload length does not fit
    /// the header's 32-bit length field.
    pub fn to_frame(&self) -> Result<Vec<u8>> {
        let length = u32::try_from(self.payload.len())
            .map_err(|_| BackdropError::Protocol("request payload too large".to_string()))?;
        Ok(build_frame(&Header::new(length, self.kind), &self.payload))
    }
}

/// A reply as seen by a control client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub kind: ReplyKind,
    pub payload: Bytes,
}

impl Reply {
    pub fn new(kind: ReplyKind, payload: Bytes) -> Self {
        Self { kind, payload }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.kind == ReplyKind::Success
    }

    /// Payload as text, with trailing NUL terminators removed.
    pub fn message(&self) -> String {
        let end = self
            .payload
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |i| i + 1);
        String::from_utf8_lossy(&self.payload[..end]).into_owned()
    }
}

/// Build a complete frame as a single byte vector.
pub fn build_frame(header: &Header, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}
