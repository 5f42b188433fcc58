//! Control client.
//!
//! Sends one request frame and reads back one reply frame. Used by the
//! `backdrop msg` subcommand and by tests.
//!
//! # Example
//!
//! ```ignore
//! use backdrop::client::ControlClient;
//! use backdrop::protocol::RequestKind;
//!
//! let mut client = ControlClient::connect("/run/user/1000/backdrop.wayland-1").await?;
//! let reply = client.request(RequestKind::Set, b"/home/me/wall.png").await?;
//! println!("{}", reply.message());
//! ```

use std::path::Path;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use crate::error::{BackdropError, Result};
use crate::protocol::{Header, Reply, ReplyKind, Request, RequestKind, HEADER_SIZE};

/// Largest reply payload the client accepts.
const MAX_REPLY_PAYLOAD: u32 = 64 * 1024;

/// Connection to a running daemon.
pub struct ControlClient {
    stream: UnixStream,
}

impl ControlClient {
    /// Connect to the daemon listening at `path`.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).await.map_err(|e| {
            BackdropError::Socket(format!("unable to connect to {}: {}", path.display(), e))
        })?;
        Ok(Self { stream })
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: UnixStream) -> Self {
        Self { stream }
    }

    /// Send a request and wait for its reply.
    pub async fn request(&mut self, kind: RequestKind, payload: &[u8]) -> Result<Reply> {
        self.send(kind, payload).await?;
        self.read_reply().await
    }

    /// Send a request without waiting for a reply.
    pub async fn send(&mut self, kind: RequestKind, payload: &[u8]) -> Result<()> {
        let frame = Request::new(kind, Bytes::copy_from_slice(payload)).to_frame()?;
        self.stream.write_all(&frame).await?;
        Ok(())
    }

    /// Read the next reply frame.
    pub async fn read_reply(&mut self) -> Result<Reply> {
        let mut header_buf = [0u8; HEADER_SIZE];
        self.read_exact(&mut header_buf).await?;

        let header = Header::decode(&header_buf)
            .ok_or_else(|| BackdropError::Protocol("short reply header".to_string()))?;
        let kind = ReplyKind::try_from(header.kind)?;
        if header.length > MAX_REPLY_PAYLOAD {
            return Err(BackdropError::Protocol(format!(
                "reply payload of {} bytes exceeds maximum {}",
                header.length, MAX_REPLY_PAYLOAD
            )));
        }

        let mut payload = vec![0u8; header.length as usize];
        self.read_exact(&mut payload).await?;

        Ok(Reply::new(kind, Bytes::from(payload)))
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.stream.read_exact(buf).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(BackdropError::ConnectionClosed)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get the underlying stream.
    pub fn stream_mut(&mut self) -> &mut UnixStream {
        &mut self.stream
    }
}
