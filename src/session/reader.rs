//! Inbound frame reassembly.
//!
//! Implements a state machine for handling fragmented frames without an
//! intermediate buffer: bytes stay in the socket's receive queue until the
//! transport reports that a whole header or a whole payload is available.
//! - `AwaitingHeader`: Need at least 8 bytes
//! - `AwaitingPayload`: Header validated, need `length` more bytes

use std::io;

use bytes::BytesMut;

use crate::error::{BackdropError, Result};
use crate::protocol::{Header, Request, RequestKind, HEADER_SIZE, MAX_REQUEST_PAYLOAD_CEILING};
use crate::transport::Transport;

/// State machine for frame parsing.
#[derive(Debug, Clone, Copy)]
enum State {
    AwaitingHeader,
    AwaitingPayload { header: Header, kind: RequestKind },
}

/// Requests completed by one readable signal.
#[derive(Debug, Default)]
pub struct ReadBatch {
    /// Completed requests, in arrival order.
    pub requests: Vec<Request>,
    /// Peer closed its end; no further requests will arrive.
    pub closed: bool,
}

/// Reassembles request frames across arbitrarily many readable signals.
#[derive(Debug)]
pub struct FrameReader {
    state: State,
    max_payload: u32,
}

impl FrameReader {
    /// Reader rejecting payloads over `max_payload` bytes.
    ///
    /// Limits above [`MAX_REQUEST_PAYLOAD_CEILING`] are clamped to it.
    pub fn new(max_payload: u32) -> Self {
        Self {
            state: State::AwaitingHeader,
            max_payload: max_payload.min(MAX_REQUEST_PAYLOAD_CEILING),
        }
    }

    pub fn max_payload(&self) -> u32 {
        self.max_payload
    }

    /// Header received and waiting for its payload, if any.
    pub fn pending_header(&self) -> Option<Header> {
        match self.state {
            State::AwaitingHeader => None,
            State::AwaitingPayload { header, .. } => Some(header),
        }
    }

    /// Consume every complete frame currently available on the transport.
    ///
    /// Stops as soon as the transport holds less than the next header or
    /// payload; that is the normal "no progress" outcome, not an error.
    ///
    /// # Errors
    ///
    /// Unknown request types, oversize payloads and transport errors other
    /// than would-block are fatal for the connection.
    pub fn read<T: Transport>(&mut self, transport: &mut T) -> Result<ReadBatch> {
        let mut batch = ReadBatch::default();

        loop {
            match self.try_read_one(transport)? {
                Step::Request(request) => batch.requests.push(request),
                Step::Waiting => return Ok(batch),
                Step::Closed => {
                    batch.closed = true;
                    return Ok(batch);
                }
            }
        }
    }

    fn try_read_one<T: Transport>(&mut self, transport: &mut T) -> Result<Step> {
        match self.state {
            State::AwaitingHeader => {
                let available = match available(transport)? {
                    Some(n) => n,
                    None => return Ok(Step::Closed),
                };
                if available < HEADER_SIZE {
                    return Ok(Step::Waiting);
                }

                let mut buf = [0u8; HEADER_SIZE];
                read_exact(transport, &mut buf)?;
                let header = Header::decode(&buf).ok_or_else(|| {
                    BackdropError::Protocol("short header read".to_string())
                })?;

                let kind = header.validate_request(self.max_payload)?;
                tracing::debug!(
                    "Received {} header, payload {} bytes",
                    kind.name(),
                    header.length
                );

                self.state = State::AwaitingPayload { header, kind };
                self.try_read_one(transport)
            }

            State::AwaitingPayload { header, kind } => {
                let length = header.length as usize;

                if length > 0 {
                    match available(transport)? {
                        Some(n) if n >= length => {}
                        Some(_) => return Ok(Step::Waiting),
                        None => return Ok(Step::Closed),
                    }
                }

                let mut payload = BytesMut::zeroed(length);
                read_exact(transport, &mut payload)?;

                // Reset state for next frame
                self.state = State::AwaitingHeader;

                Ok(Step::Request(Request::new(kind, payload.freeze())))
            }
        }
    }
}

enum Step {
    Request(Request),
    Waiting,
    Closed,
}

/// Bytes readable now, or `None` once the peer has closed.
fn available<T: Transport>(transport: &mut T) -> Result<Option<usize>> {
    match transport.available() {
        Ok(n) => Ok(Some(n)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(Some(0)),
        Err(e) => Err(e.into()),
    }
}

/// Read exactly `buf.len()` bytes that the transport reported as available.
fn read_exact<T: Transport>(transport: &mut T, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match transport.read(&mut buf[filled..]) {
            Ok(0) => return Err(BackdropError::ConnectionClosed),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
