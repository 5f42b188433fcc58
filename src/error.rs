//! Error types for backdrop.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for all backdrop operations.
#[derive(Debug, Error)]
pub enum BackdropError {
    /// I/O error during socket or filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error (readiness announcement only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Protocol error (oversize frame, malformed reply, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Frame header carried a type outside the request kind set.
    #[error("Unknown request type: {0}")]
    UnknownRequestType(u32),

    /// Reply frame carried a type outside the reply kind set.
    #[error("Unknown reply type: {0}")]
    UnknownReplyType(u32),

    /// Reply would push the session write buffer past its cap.
    #[error("Reply too large: {needed} bytes buffered would exceed maximum {max}")]
    ReplyTooLarge { needed: usize, max: usize },

    /// Peer closed the connection.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Image path could not be resolved to a canonical path.
    #[error("Failed to resolve image path {path}: {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Image could not be decoded.
    #[error("Failed to load image {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    /// Unsupported placement mode string.
    #[error("Unsupported background mode: {0}")]
    InvalidMode(String),

    /// Malformed colour string.
    #[error("Invalid color: {0}")]
    InvalidColor(String),

    /// Malformed output description.
    #[error("Invalid output: {0}")]
    InvalidTarget(String),

    /// Socket path could not be derived or bound.
    #[error("Socket error: {0}")]
    Socket(String),
}

/// Result type alias using BackdropError.
pub type Result<T> = std::result::Result<T, BackdropError>;
