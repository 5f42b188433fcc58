//! Readiness announcement.
//!
//! Once the socket is listening the daemon can print one JSON line so a
//! supervisor knows where to connect:
//!
//! ```text
//! {"event":"ready","socket":"/run/user/1000/backdrop.wayland-1","pid":4242,"version":"0.1.0"}
//! ```

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;

/// Crate version reported in the announcement.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The ready line.
#[derive(Debug, Clone, Serialize)]
pub struct ReadyMessage {
    pub event: &'static str,
    pub socket: String,
    pub pid: u32,
    pub version: &'static str,
}

impl ReadyMessage {
    pub fn new(socket: &Path) -> Self {
        Self {
            event: "ready",
            socket: socket.display().to_string(),
            pid: std::process::id(),
            version: VERSION,
        }
    }
}

/// Build the ready line for `socket` as a JSON string.
pub fn build_ready_message(socket: &Path) -> Result<String> {
    Ok(serde_json::to_string(&ReadyMessage::new(socket))?)
}

/// Write the ready line for `socket` to `writer` and flush it.
pub fn write_ready<W: Write>(writer: &mut W, socket: &Path) -> Result<()> {
    let line = build_ready_message(socket)?;
    writeln!(writer, "{line}")?;
    writer.flush()?;
    Ok(())
}

/// Print the ready line for `socket` on stdout.
///
/// stdout carries only this line; logs go to stderr.
pub fn announce_ready(socket: &Path) -> Result<()> {
    write_ready(&mut std::io::stdout().lock(), socket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_message_fields() {
        let json = build_ready_message(Path::new("/tmp/backdrop.wayland-0")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["event"], "ready");
        assert_eq!(value["socket"], "/tmp/backdrop.wayland-0");
        assert_eq!(value["pid"], std::process::id());
        assert_eq!(value["version"], VERSION);
    }

    #[test]
    fn test_write_ready_emits_one_terminated_line() {
        let mut out = Vec::new();
        write_ready(&mut out, Path::new("/tmp/backdrop.1000.42")).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches('\n').count(), 1);
        assert!(text.ends_with("}\n"));
        assert!(text.contains(r#""socket":"/tmp/backdrop.1000.42""#));
    }

    #[test]
    fn test_ready_message_is_one_line() {
        let json = build_ready_message(Path::new("/tmp/with space")).unwrap();
        assert!(!json.contains('\n'));
        assert!(json.starts_with(r#"{"event":"ready""#));
    }
}
