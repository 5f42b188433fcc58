//! Unix domain socket implementation.
//!
//! # Example
//!
//! ```ignore
//! use backdrop::transport::{resolve_socket_path, SocketDiscriminator, SocketListener};
//!
//! let path = resolve_socket_path(None, &SocketDiscriminator::Display);
//! let listener = SocketListener::bind(&path).await?;
//! let stream = listener.accept().await?;
//! ```

use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};

use super::Transport;
use crate::error::{BackdropError, Result};

/// Name used for the socket file and log target.
pub const APP_NAME: &str = "backdrop";

/// Display name used when `WAYLAND_DISPLAY` is unset.
const FALLBACK_DISPLAY: &str = "wayland-0";

/// Room in `sockaddr_un.sun_path`, including the terminator.
const SUN_PATH_LEN: usize = 108;

/// What distinguishes one daemon's socket from another's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SocketDiscriminator {
    /// One daemon per display: `backdrop.<WAYLAND_DISPLAY>`.
    #[default]
    Display,
    /// One socket per process: `backdrop.<uid>.<pid>`.
    Process,
}

impl SocketDiscriminator {
    fn suffix(self) -> String {
        match self {
            SocketDiscriminator::Display => std::env::var("WAYLAND_DISPLAY")
                .ok()
                .filter(|d| !d.is_empty())
                .map(|d| d.replace('/', "_"))
                .unwrap_or_else(|| FALLBACK_DISPLAY.to_string()),
            SocketDiscriminator::Process => {
                // SAFETY: getuid has no preconditions and cannot fail.
                let uid = unsafe { libc::getuid() };
                format!("{}.{}", uid, std::process::id())
            }
        }
    }
}

/// `$XDG_RUNTIME_DIR`, or `/tmp` when it is unset or empty.
pub fn runtime_dir() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR")
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

/// Derived socket path: `<runtime dir>/backdrop.<discriminator>`.
pub fn default_socket_path(discriminator: SocketDiscriminator) -> PathBuf {
    runtime_dir().join(format!("{}.{}", APP_NAME, discriminator.suffix()))
}

/// Pick the socket path to bind.
///
/// An explicit path wins unless a live peer is already accepting on it, in
/// which case the derived path is used instead.
pub fn resolve_socket_path(explicit: Option<&Path>, discriminator: SocketDiscriminator) -> PathBuf {
    match explicit {
        Some(path) if !peer_is_live(path) => path.to_path_buf(),
        Some(path) => {
            let fallback = default_socket_path(discriminator);
            tracing::warn!(
                "{} is in use by another process, using {}",
                path.display(),
                fallback.display()
            );
            fallback
        }
        None => default_socket_path(discriminator),
    }
}

fn peer_is_live(path: &Path) -> bool {
    std::os::unix::net::UnixStream::connect(path).is_ok()
}

/// Listening control socket.
///
/// The socket file is removed exactly once, when the listener is dropped.
pub struct SocketListener {
    listener: UnixListener,
    path: PathBuf,
}

impl SocketListener {
    /// Bind to a Unix socket path.
    ///
    /// Removes any existing socket file at the path before binding and
    /// restricts the new one to the owner.
    pub async fn bind(path: &Path) -> Result<Self> {
        if path.as_os_str().as_bytes().len() >= SUN_PATH_LEN {
            return Err(BackdropError::Socket(format!(
                "socket path {} won't fit into sockaddr_un",
                path.display()
            )));
        }

        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!("Removed stale socket {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let listener = UnixListener::bind(path).map_err(|e| {
            BackdropError::Socket(format!("unable to bind {}: {}", path.display(), e))
        })?;
        let listener = Self {
            listener,
            path: path.to_path_buf(),
        };

        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;

        tracing::info!("Listening on {}", path.display());
        Ok(listener)
    }

    /// Accept a single connection.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self.listener.accept().await?;
        Ok(stream)
    }

    /// Get the socket path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SocketListener {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed socket {}", self.path.display()),
            Err(e) => tracing::warn!("Unable to remove socket {}: {}", self.path.display(), e),
        }
    }
}

/// [`Transport`] over a connected, non-blocking Unix stream.
pub struct SocketTransport<'a> {
    stream: &'a UnixStream,
}

impl<'a> SocketTransport<'a> {
    pub fn new(stream: &'a UnixStream) -> Self {
        Self { stream }
    }
}

impl Transport for SocketTransport<'_> {
    fn available(&mut self) -> io::Result<usize> {
        let fd = self.stream.as_raw_fd();

        let mut queued: libc::c_int = 0;
        // SAFETY: fd is a live socket borrowed from `stream`; FIONREAD writes one c_int.
        if unsafe { libc::ioctl(fd, libc::FIONREAD, &mut queued as *mut libc::c_int) } == -1 {
            return Err(io::Error::last_os_error());
        }
        if queued > 0 {
            return Ok(queued as usize);
        }

        // FIONREAD says 0 both for "nothing yet" and for end-of-stream.
        let mut probe = 0u8;
        // SAFETY: probe is a valid one-byte buffer; MSG_PEEK leaves the queue intact.
        let peeked = unsafe {
            libc::recv(
                fd,
                &mut probe as *mut u8 as *mut libc::c_void,
                1,
                libc::MSG_PEEK,
            )
        };
        match peeked {
            0 => Err(io::ErrorKind::UnexpectedEof.into()),
            n if n > 0 => Ok(n as usize),
            _ => {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::WouldBlock {
                    Ok(0)
                } else {
                    Err(err)
                }
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.try_read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.try_write(buf)
    }
}
