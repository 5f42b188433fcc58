//! Request context for handlers.
//!
//! Provides methods for replying to a request:
//! - `ok` - send `Success` with the standard `OK` payload
//! - `respond` - send `Success` with a custom payload
//! - `error` - send `Failure` with a message
//!
//! Each method consumes the context, so a handler replies at most once.
//!
//! # Example
//!
//! ```ignore
//! fn flush(state: &mut State, _payload: &[u8], ctx: RequestContext<'_>) -> HandlerResult {
//!     state.cache.flush();
//!     ctx.ok()
//! }
//! ```

use crate::error::Result;
use crate::protocol::{ReplyKind, RequestKind, REPLY_OK};
use crate::session::Session;

/// Context passed to request handlers.
///
/// Borrows the requesting connection's [`Session`] for the duration of the
/// handler call; replies are buffered there until the socket is writable.
pub struct RequestContext<'a> {
    kind: RequestKind,
    session: &'a mut Session,
}

impl<'a> RequestContext<'a> {
    pub fn new(kind: RequestKind, session: &'a mut Session) -> Self {
        Self { kind, session }
    }

    /// Kind of the request being handled.
    #[inline]
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Reply `Success` with `OK`.
    pub fn ok(self) -> Result<()> {
        self.respond(REPLY_OK)
    }

    /// Reply `Success` with raw payload bytes.
    pub fn respond(self, payload: &[u8]) -> Result<()> {
        self.session.enqueue_reply(ReplyKind::Success, payload)
    }

    /// Reply `Failure` with a NUL-terminated message.
    pub fn error(self, message: &str) -> Result<()> {
        tracing::debug!("{} request failed: {}", self.kind.name(), message);

        let mut payload = Vec::with_capacity(message.len() + 1);
        payload.extend_from_slice(message.as_bytes());
        payload.push(0);
        self.session.enqueue_reply(ReplyKind::Failure, &payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Header, HEADER_SIZE};
    use crate::session::SessionLimits;
    use crate::transport::MemoryTransport;

    fn drain(session: &mut Session) -> Vec<u8> {
        let mut transport = MemoryTransport::new();
        session.on_writable(&mut transport).unwrap();
        transport.take_written()
    }

    #[test]
    fn test_ok_sends_success() {
        let mut session = Session::default();
        RequestContext::new(RequestKind::Set, &mut session).ok().unwrap();

        let bytes = drain(&mut session);
        let header = Header::decode(&bytes).unwrap();
        assert_eq!(header.kind, u32::from(ReplyKind::Success));
        assert_eq!(&bytes[HEADER_SIZE..], b"OK\0");
    }

    #[test]
    fn test_error_sends_terminated_message() {
        let mut session = Session::default();
        let ctx = RequestContext::new(RequestKind::Load, &mut session);
        assert_eq!(ctx.kind(), RequestKind::Load);
        ctx.error("no such file").unwrap();

        let bytes = drain(&mut session);
        let header = Header::decode(&bytes).unwrap();
        assert_eq!(header.kind, u32::from(ReplyKind::Failure));
        assert_eq!(header.length as usize, "no such file".len() + 1);
        assert_eq!(&bytes[HEADER_SIZE..], b"no such file\0");
    }

    #[test]
    fn test_respond_propagates_overflow() {
        let mut session = Session::new(SessionLimits {
            initial_reply_capacity: 16,
            max_reply_buffer: 16,
            ..SessionLimits::default()
        });

        let result = RequestContext::new(RequestKind::Set, &mut session).respond(&[b'x'; 32]);
        assert!(result.is_err());
        assert!(!session.has_pending_output());
    }
}
