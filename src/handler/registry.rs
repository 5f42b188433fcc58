//! Handler registry for dispatching requests by kind.
//!
//! The registry is built once, before the server starts, and moved into a
//! [`Dispatcher`](super::Dispatcher). Every handler receives the shared state
//! value `C` mutably, the raw payload and a [`RequestContext`] to reply with.
//!
//! # Example
//!
//! ```
//! use backdrop::handler::HandlerRegistry;
//! use backdrop::protocol::RequestKind;
//!
//! let mut registry = HandlerRegistry::<u32>::new();
//! registry.register(RequestKind::Flush, |flushes, _payload, ctx| {
//!     *flushes += 1;
//!     ctx.ok()
//! });
//!
//! assert!(registry.contains(RequestKind::Flush));
//! assert!(!registry.contains(RequestKind::Set));
//! ```

use std::collections::HashMap;

use super::RequestContext;
use crate::error::Result;
use crate::protocol::RequestKind;

/// Result type for handler functions.
pub type HandlerResult = Result<()>;

/// Trait for request handlers over shared state `C`.
///
/// An `Err` means the reply could not be buffered; the connection is closed.
/// Handler-level failures are reported with [`RequestContext::error`] instead.
pub trait Handler<C> {
    fn call(&self, state: &mut C, payload: &[u8], ctx: RequestContext<'_>) -> HandlerResult;
}

impl<C, F> Handler<C> for F
where
    F: Fn(&mut C, &[u8], RequestContext<'_>) -> HandlerResult,
{
    fn call(&self, state: &mut C, payload: &[u8], ctx: RequestContext<'_>) -> HandlerResult {
        self(state, payload, ctx)
    }
}

/// Registry mapping request kinds to handlers.
pub struct HandlerRegistry<C> {
    handlers: HashMap<RequestKind, Box<dyn Handler<C>>>,
}

impl<C> HandlerRegistry<C> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a closure for `kind`, replacing any previous handler.
    pub fn register<F>(&mut self, kind: RequestKind, handler: F)
    where
        F: Fn(&mut C, &[u8], RequestContext<'_>) -> HandlerResult + 'static,
    {
        self.register_handler(kind, Box::new(handler));
    }

    /// Register a boxed handler for `kind`, replacing any previous handler.
    pub fn register_handler(&mut self, kind: RequestKind, handler: Box<dyn Handler<C>>) {
        if self.handlers.insert(kind, handler).is_some() {
            tracing::debug!("Replaced handler for {} requests", kind.name());
        }
    }

    /// Get the handler for `kind`.
    pub fn get(&self, kind: RequestKind) -> Option<&dyn Handler<C>> {
        self.handlers.get(&kind).map(|h| h.as_ref())
    }

    pub fn contains(&self, kind: RequestKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Registered kinds, in wire order.
    pub fn kinds(&self) -> Vec<RequestKind> {
        RequestKind::ALL
            .into_iter()
            .filter(|kind| self.contains(*kind))
            .collect()
    }
}

impl<C> Default for HandlerRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;

    struct Counter {
        calls: usize,
    }

    impl Handler<usize> for Counter {
        fn call(&self, state: &mut usize, _payload: &[u8], ctx: RequestContext<'_>) -> HandlerResult {
            *state += self.calls;
            ctx.ok()
        }
    }

    #[test]
    fn test_register_closure() {
        let mut registry = HandlerRegistry::<Vec<u8>>::new();
        registry.register(RequestKind::Set, |seen, payload, ctx| {
            seen.extend_from_slice(payload);
            ctx.ok()
        });

        let mut seen = Vec::new();
        let mut session = Session::default();
        let handler = registry.get(RequestKind::Set).unwrap();
        handler
            .call(&mut seen, b"a.png", RequestContext::new(RequestKind::Set, &mut session))
            .unwrap();

        assert_eq!(seen, b"a.png");
        assert!(session.has_pending_output());
    }

    #[test]
    fn test_register_boxed_handler() {
        let mut registry = HandlerRegistry::<usize>::new();
        registry.register_handler(RequestKind::Load, Box::new(Counter { calls: 3 }));

        let mut state = 0;
        let mut session = Session::default();
        registry
            .get(RequestKind::Load)
            .unwrap()
            .call(&mut state, b"", RequestContext::new(RequestKind::Load, &mut session))
            .unwrap();
        assert_eq!(state, 3);
    }

    #[test]
    fn test_missing_handler() {
        let registry = HandlerRegistry::<()>::new();
        assert!(registry.get(RequestKind::Flush).is_none());
        assert!(registry.kinds().is_empty());
    }

    #[test]
    fn test_kinds_in_wire_order() {
        let mut registry = HandlerRegistry::<()>::new();
        registry.register(RequestKind::Flush, |_, _, ctx| ctx.ok());
        registry.register(RequestKind::Set, |_, _, ctx| ctx.ok());

        assert_eq!(registry.kinds(), vec![RequestKind::Set, RequestKind::Flush]);
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = HandlerRegistry::<u8>::new();
        registry.register(RequestKind::Set, |state, _, ctx| {
            *state = 1;
            ctx.ok()
        });
        registry.register(RequestKind::Set, |state, _, ctx| {
            *state = 2;
            ctx.ok()
        });

        let mut state = 0;
        let mut session = Session::default();
        registry
            .get(RequestKind::Set)
            .unwrap()
            .call(&mut state, b"", RequestContext::new(RequestKind::Set, &mut session))
            .unwrap();
        assert_eq!(state, 2);
    }
}
