//! Dispatch of completed requests.

use std::cell::RefCell;

use super::{HandlerRegistry, RequestContext};
use crate::error::Result;
use crate::protocol::Request;
use crate::session::Session;

/// Owns the handler registry and the state shared by every connection.
///
/// The state lives in a `RefCell` that is borrowed only while one handler
/// runs; handlers are synchronous, so borrows never overlap.
pub struct Dispatcher<C> {
    registry: HandlerRegistry<C>,
    state: RefCell<C>,
}

impl<C> Dispatcher<C> {
    pub fn new(registry: HandlerRegistry<C>, state: C) -> Self {
        Self {
            registry,
            state: RefCell::new(state),
        }
    }

    /// Run the handler registered for `request.kind`.
    ///
    /// A kind without a handler is logged and dropped: no reply is queued and
    /// the connection stays open. An `Err` is fatal for the requesting
    /// connection only.
    pub fn dispatch(&self, request: &Request, session: &mut Session) -> Result<()> {
        let Some(handler) = self.registry.get(request.kind) else {
            tracing::warn!(
                "No handler registered for {} request, dropping it",
                request.kind.name()
            );
            return Ok(());
        };

        tracing::debug!(
            "Dispatching {} request ({} bytes)",
            request.kind.name(),
            request.payload.len()
        );
        let mut state = self.state.borrow_mut();
        handler.call(
            &mut state,
            request.payload(),
            RequestContext::new(request.kind, session),
        )
    }

    pub fn registry(&self) -> &HandlerRegistry<C> {
        &self.registry
    }

    /// Run `f` with the shared state borrowed mutably.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        f(&mut self.state.borrow_mut())
    }

    /// Take the shared state back, releasing everything it owns with it.
    pub fn into_state(self) -> C {
        self.state.into_inner()
    }
}
