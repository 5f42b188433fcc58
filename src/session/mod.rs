//! Per-connection session state.
//!
//! A [`Session`] pairs the inbound [`FrameReader`] with the outbound
//! [`ReplyBuffer`]. It never blocks: each readable or writable signal makes
//! bounded progress and returns.
//!
//! # Example
//!
//! ```
//! use backdrop::protocol::{build_frame, Header, ReplyKind, RequestKind};
//! use backdrop::session::{Session, SessionLimits};
//! use backdrop::transport::MemoryTransport;
//!
//! let mut session = Session::new(SessionLimits::default());
//! let mut transport = MemoryTransport::new();
//! transport.deliver(&build_frame(&Header::new(0, RequestKind::Flush), b""));
//!
//! let batch = session.on_readable(&mut transport).unwrap();
//! assert_eq!(batch.requests[0].kind, RequestKind::Flush);
//!
//! session.enqueue_reply(ReplyKind::Success, b"OK").unwrap();
//! session.on_writable(&mut transport).unwrap();
//! assert!(!session.has_pending_output());
//! ```

mod reader;
mod reply_buffer;

pub use reader::{FrameReader, ReadBatch};
pub use reply_buffer::{
    ReplyBuffer, WriteOutcome, DEFAULT_INITIAL_REPLY_CAPACITY, DEFAULT_MAX_REPLY_BUFFER,
};

use crate::error::Result;
use crate::protocol::{Header, ReplyKind, DEFAULT_MAX_REQUEST_PAYLOAD};
use crate::transport::Transport;

/// Size limits applied to every session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Largest request payload accepted before the connection is dropped.
    pub max_request_payload: u32,
    /// Reply buffer capacity allocated on first use.
    pub initial_reply_capacity: usize,
    /// Reply buffer ceiling.
    pub max_reply_buffer: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_request_payload: DEFAULT_MAX_REQUEST_PAYLOAD,
            initial_reply_capacity: DEFAULT_INITIAL_REPLY_CAPACITY,
            max_reply_buffer: DEFAULT_MAX_REPLY_BUFFER,
        }
    }
}

/// Read and write state for one control connection.
#[derive(Debug)]
pub struct Session {
    reader: FrameReader,
    replies: ReplyBuffer,
}

impl Session {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            reader: FrameReader::new(limits.max_request_payload),
            replies: ReplyBuffer::new(limits.initial_reply_capacity, limits.max_reply_buffer),
        }
    }

    /// Handle a readable signal: collect every request that is now complete.
    pub fn on_readable<T: Transport>(&mut self, transport: &mut T) -> Result<ReadBatch> {
        self.reader.read(transport)
    }

    /// Handle a writable signal: one non-blocking write of buffered replies.
    pub fn on_writable<T: Transport>(&mut self, transport: &mut T) -> Result<WriteOutcome> {
        self.replies.flush(transport)
    }

    /// Queue a reply frame for the next writable signal.
    pub fn enqueue_reply(&mut self, kind: ReplyKind, payload: &[u8]) -> Result<()> {
        self.replies.enqueue(kind, payload)
    }

    /// Whether replies are waiting for a writable signal.
    #[inline]
    pub fn has_pending_output(&self) -> bool {
        !self.replies.is_empty()
    }

    /// Header received and waiting for its payload, if any.
    pub fn pending_header(&self) -> Option<Header> {
        self.reader.pending_header()
    }

    pub fn replies(&self) -> &ReplyBuffer {
        &self.replies
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionLimits::default())
    }
}
