//! # backdrop
//!
//! Wallpaper daemon with a local control socket.
//!
//! The daemon paints a wallpaper onto one or more outputs and accepts
//! `set`, `load` and `flush` requests over a Unix domain socket using a
//! small length-framed protocol.
//!
//! ## Architecture
//!
//! - **Protocol** ([`protocol`]): 8-byte header (length, type), request and reply kinds
//! - **Session** ([`session`]): non-blocking frame reassembly and a bounded reply buffer
//! - **Dispatch** ([`handler`]): handler registry plus shared state
//! - **Cache** ([`cache`]): decoded images keyed by canonical path, revalidated by timestamps
//! - **Render** ([`render`]): placement math and the paint collaborator
//! - **Server** ([`server`]): socket lifecycle and per-connection driving on one thread
//!
//! ## Example
//!
//! ```ignore
//! use backdrop::daemon::{self, WallpaperState};
//! use backdrop::render::{CanvasPainter, Target};
//! use backdrop::Server;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> backdrop::Result<()> {
//!     let state = WallpaperState::new(CanvasPainter::new())
//!         .targets(vec![Target::new("eDP-1", 1920, 1080)]);
//!
//!     let server = Server::builder()
//!         .handlers(daemon::handlers())
//!         .bind(state)
//!         .await?;
//!
//!     server.serve(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod control;
pub mod daemon;
pub mod error;
pub mod handler;
pub mod logging;
pub mod protocol;
pub mod render;
pub mod server;
pub mod session;
pub mod transport;

pub use client::ControlClient;
pub use error::{BackdropError, Result};
pub use server::{Server, ServerBuilder, ServerConfig};
