//! Server builder and connection loop.
//!
//! The [`ServerBuilder`] provides a fluent API for configuring handlers and
//! limits. The [`Server`] manages the lifecycle:
//! 1. Resolve and bind the control socket
//! 2. Accept connections until the shutdown future resolves
//! 3. Drive each connection's [`Session`] from socket readiness
//! 4. Unlink the socket and hand the shared state back
//!
//! Everything runs on the calling thread. Connections are local tasks on a
//! [`LocalSet`], and handlers borrow the shared state only while they run.
//!
//! # Example
//!
//! ```ignore
//! use backdrop::protocol::RequestKind;
//! use backdrop::server::Server;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> backdrop::Result<()> {
//!     let server = Server::builder()
//!         .handle(RequestKind::Flush, |flushes: &mut u32, _payload, ctx| {
//!             *flushes += 1;
//!             ctx.ok()
//!         })
//!         .bind(0)
//!         .await?;
//!
//!     let flushes = server.serve(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//!     println!("{flushes} flushes");
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::rc::Rc;

use tokio::io::Interest;
use tokio::net::UnixStream;
use tokio::task::LocalSet;

use crate::error::{BackdropError, Result};
use crate::handler::{Dispatcher, HandlerRegistry, HandlerResult, RequestContext};
use crate::protocol::{RequestKind, MAX_REQUEST_PAYLOAD_CEILING};
use crate::session::{Session, SessionLimits, WriteOutcome};
use crate::transport::{resolve_socket_path, SocketDiscriminator, SocketListener, SocketTransport};

/// Server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Explicit socket path; derived from the discriminator when unset.
    pub socket_path: Option<PathBuf>,
    pub discriminator: SocketDiscriminator,
    pub limits: SessionLimits,
}

/// Builder for configuring and creating a [`Server`].
pub struct ServerBuilder<C> {
    registry: HandlerRegistry<C>,
    config: ServerConfig,
}

impl<C: 'static> ServerBuilder<C> {
    /// Create a new server builder.
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            config: ServerConfig::default(),
        }
    }

    /// Register a handler for `kind`.
    pub fn handle<F>(mut self, kind: RequestKind, handler: F) -> Self
    where
        F: Fn(&mut C, &[u8], RequestContext<'_>) -> HandlerResult + 'static,
    {
        self.registry.register(kind, handler);
        self
    }

    /// Use a prepared registry, replacing any handlers added so far.
    pub fn handlers(mut self, registry: HandlerRegistry<C>) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Bind this path instead of the derived one, unless a live peer owns it.
    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.socket_path = Some(path.into());
        self
    }

    /// Choose how the derived socket path is made unique.
    ///
    /// Default: [`SocketDiscriminator::Display`]
    pub fn discriminator(mut self, discriminator: SocketDiscriminator) -> Self {
        self.config.discriminator = discriminator;
        self
    }

    /// Set the largest accepted request payload.
    ///
    /// A payload is read only once it is fully queued on the socket, so the
    /// limit is clamped to [`MAX_REQUEST_PAYLOAD_CEILING`], which stays under
    /// the default socket receive buffer.
    ///
    /// Default: 16 KiB
    pub fn max_request_payload(mut self, limit: u32) -> Self {
        self.config.limits.max_request_payload = limit.min(MAX_REQUEST_PAYLOAD_CEILING);
        self
    }

    /// Set the per-connection reply buffer ceiling.
    ///
    /// Default: 16 KiB
    pub fn max_reply_buffer(mut self, limit: usize) -> Self {
        self.config.limits.max_reply_buffer = limit;
        self
    }

    /// Set the reply buffer capacity allocated on first use.
    ///
    /// Default: 1 KiB
    pub fn initial_reply_capacity(mut self, capacity: usize) -> Self {
        self.config.limits.initial_reply_capacity = capacity;
        self
    }

    /// Bind the control socket. `state` is shared by every handler.
    pub async fn bind(self, state: C) -> Result<Server<C>> {
        let path = resolve_socket_path(
            self.config.socket_path.as_deref(),
            self.config.discriminator,
        );
        let listener = SocketListener::bind(&path).await?;

        tracing::debug!(
            "Handlers registered for {:?}",
            self.registry.kinds()
        );

        Ok(Server {
            listener,
            dispatcher: Dispatcher::new(self.registry, state),
            limits: self.config.limits,
        })
    }
}

impl<C: 'static> Default for ServerBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound control server.
pub struct Server<C> {
    listener: SocketListener,
    dispatcher: Dispatcher<C>,
    limits: SessionLimits,
}

impl<C: 'static> Server<C> {
    /// Create a new server builder.
    pub fn builder() -> ServerBuilder<C> {
        ServerBuilder::new()
    }

    /// Path of the bound socket.
    pub fn path(&self) -> &Path {
        self.listener.path()
    }

    /// Accept and serve connections until `shutdown` resolves.
    ///
    /// On return the listening socket has been closed and unlinked, every
    /// connection has been dropped, and the shared state is handed back.
    pub async fn serve<F>(self, shutdown: F) -> Result<C>
    where
        F: Future<Output = ()>,
    {
        let Server {
            listener,
            dispatcher,
            limits,
        } = self;
        let dispatcher = Rc::new(dispatcher);

        let local = LocalSet::new();
        local
            .run_until(accept_loop(&listener, &dispatcher, limits, shutdown))
            .await;

        // Dropping the set cancels the connection tasks and their sessions.
        drop(local);
        drop(listener);

        Rc::try_unwrap(dispatcher)
            .map(Dispatcher::into_state)
            .map_err(|_| BackdropError::Protocol("connection outlived the server".to_string()))
    }
}

async fn accept_loop<C, F>(
    listener: &SocketListener,
    dispatcher: &Rc<Dispatcher<C>>,
    limits: SessionLimits,
    shutdown: F,
) where
    C: 'static,
    F: Future<Output = ()>,
{
    let mut shutdown = pin!(shutdown);
    let mut next_id: u64 = 1;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutting down");
                return;
            }
            accepted = listener.accept() => match accepted {
                Ok(stream) => {
                    let id = next_id;
                    next_id += 1;
                    tracing::debug!("Accepted connection {}", id);
                    tokio::task::spawn_local(serve_connection(
                        id,
                        stream,
                        Rc::clone(dispatcher),
                        limits,
                    ));
                }
                Err(e) => tracing::warn!("Failed to accept connection: {}", e),
            },
        }
    }
}

async fn serve_connection<C>(
    id: u64,
    stream: UnixStream,
    dispatcher: Rc<Dispatcher<C>>,
    limits: SessionLimits,
) {
    let mut session = Session::new(limits);
    match drive(&stream, &mut session, &dispatcher).await {
        Ok(()) => tracing::debug!("Connection {} closed", id),
        Err(e) => tracing::warn!("Closing connection {}: {}", id, e),
    }
}

/// Run one connection until the peer goes away or a fatal error occurs.
async fn drive<C>(
    stream: &UnixStream,
    session: &mut Session,
    dispatcher: &Dispatcher<C>,
) -> Result<()> {
    loop {
        let interest = if session.has_pending_output() {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        };
        let ready = stream.ready(interest).await?;

        if ready.is_readable() || ready.is_read_closed() {
            let mut outcome = None;
            // The closure always reports would-block so tokio clears read
            // readiness: the session has read every complete frame by then.
            let _ = stream.try_io(Interest::READABLE, || {
                outcome = Some(session.on_readable(&mut SocketTransport::new(stream)));
                Err::<(), _>(io::Error::from(io::ErrorKind::WouldBlock))
            });

            if let Some(result) = outcome {
                let batch = result?;
                for request in &batch.requests {
                    dispatcher.dispatch(request, session)?;
                }

                // Closed bits are never cleared, so a peer that hung up with a
                // partial frame queued must be handled here.
                if batch.closed || ready.is_read_closed() {
                    return drain(stream, session).await;
                }
            }
        }

        if ready.is_writable() && session.has_pending_output() {
            write_pending(stream, session)?;
        }
    }
}

/// One non-blocking write of buffered replies.
fn write_pending(stream: &UnixStream, session: &mut Session) -> Result<()> {
    let mut failure = None;
    let _ = stream.try_io(Interest::WRITABLE, || {
        match session.on_writable(&mut SocketTransport::new(stream)) {
            Ok(WriteOutcome::Blocked) => Err(io::ErrorKind::WouldBlock.into()),
            Ok(_) => Ok(()),
            Err(e) => {
                failure = Some(e);
                Ok(())
            }
        }
    });

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Flush remaining replies to a peer that stopped sending.
async fn drain(stream: &UnixStream, session: &mut Session) -> Result<()> {
    while session.has_pending_output() {
        stream.writable().await?;
        if let Err(e) = write_pending(stream, session) {
            tracing::debug!("Peer went away before reading its replies: {}", e);
            return Ok(());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_configuration() {
        let builder = Server::<()>::builder()
            .socket_path("/tmp/backdrop.test")
            .discriminator(SocketDiscriminator::Process)
            .max_request_payload(512)
            .max_reply_buffer(4096)
            .initial_reply_capacity(128);

        assert_eq!(
            builder.config.socket_path.as_deref(),
            Some(Path::new("/tmp/backdrop.test"))
        );
        assert_eq!(builder.config.discriminator, SocketDiscriminator::Process);
        assert_eq!(builder.config.limits.max_request_payload, 512);
        assert_eq!(builder.config.limits.max_reply_buffer, 4096);
        assert_eq!(builder.config.limits.initial_reply_capacity, 128);
    }

    #[test]
    fn test_request_payload_limit_is_clamped() {
        let builder = Server::<()>::builder().max_request_payload(u32::MAX);
        assert_eq!(
            builder.config.limits.max_request_payload,
            MAX_REQUEST_PAYLOAD_CEILING
        );
    }

    #[test]
    fn test_builder_registers_handlers() {
        let builder = Server::<u32>::builder()
            .handle(RequestKind::Set, |_, _, ctx| ctx.ok())
            .handle(RequestKind::Flush, |_, _, ctx| ctx.ok());

        assert_eq!(
            builder.registry.kinds(),
            vec![RequestKind::Set, RequestKind::Flush]
        );
    }

    #[test]
    fn test_handlers_replace_registry() {
        let builder = Server::<u32>::builder()
            .handle(RequestKind::Set, |_, _, ctx| ctx.ok())
            .handlers(HandlerRegistry::new());

        assert!(builder.registry.kinds().is_empty());
    }

    #[tokio::test]
    async fn test_serve_returns_state_and_unlinks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctl.sock");

        let server = Server::builder()
            .socket_path(&path)
            .handle(RequestKind::Flush, |n: &mut u32, _, ctx| {
                *n += 1;
                ctx.ok()
            })
            .bind(41u32)
            .await
            .unwrap();
        assert_eq!(server.path(), path);
        assert!(path.exists());

        let state = server.serve(async {}).await.unwrap();
        assert_eq!(state, 41);
        assert!(!path.exists());
    }
}
