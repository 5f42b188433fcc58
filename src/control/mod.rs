//! Control output - what the daemon tells its supervisor on stdout.
//!
//! Only the readiness announcement is sent; everything else is logged to
//! stderr through `tracing`.

mod announce;

pub use announce::{announce_ready, build_ready_message, write_ready, ReadyMessage, VERSION};
