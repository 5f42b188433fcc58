//! Handler module - request handling and dispatch.
//!
//! Provides:
//! - [`HandlerRegistry`] - maps request kinds to handlers
//! - [`RequestContext`] - lets a handler reply through its session
//! - [`Dispatcher`] - owns the registry and shared state, runs handlers
//!
//! # Example
//!
//! ```
//! use backdrop::handler::{Dispatcher, HandlerRegistry};
//! use backdrop::protocol::{Request, RequestKind};
//! use backdrop::session::Session;
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register(RequestKind::Flush, |flushes: &mut u32, _payload, ctx| {
//!     *flushes += 1;
//!     ctx.ok()
//! });
//!
//! let dispatcher = Dispatcher::new(registry, 0u32);
//! let mut session = Session::default();
//! dispatcher
//!     .dispatch(&Request::new(RequestKind::Flush, Default::default()), &mut session)
//!     .unwrap();
//! assert_eq!(dispatcher.into_state(), 1);
//! ```

mod context;
mod dispatch;
mod registry;

pub use context::RequestContext;
pub use dispatch::Dispatcher;
pub use registry::{Handler, HandlerRegistry, HandlerResult};
