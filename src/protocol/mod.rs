//! Protocol module - wire format and frame types.
//!
//! This module implements the binary control protocol:
//! - 8-byte header encoding/decoding
//! - Request and reply kinds
//! - Frame structs and builders

mod frame;
mod wire_format;

pub use frame::{build_frame, Reply, Request};
pub use wire_format::{
    Header, ReplyKind, RequestKind, DEFAULT_MAX_REQUEST_PAYLOAD, HEADER_SIZE,
    MAX_REQUEST_PAYLOAD_CEILING, REPLY_OK,
};
