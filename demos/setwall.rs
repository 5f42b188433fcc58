//! setwall - change the wallpaper of a running daemon.
//!
//! This example demonstrates:
//! - Locating the daemon's socket the same way the daemon derives it
//! - Sending `load` to warm the cache, then `set` to switch
//! - Reading `Success` / `Failure` replies
//!
//! # Running
//!
//! ```sh
//! cargo run -- serve --output eDP-1:1920x1080 --snapshot-dir /tmp &
//! cargo run --example setwall -- ~/Pictures/a.png ~/Pictures/b.png
//! ```
//!
//! Every path is loaded first; the last one becomes the active wallpaper.

use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use backdrop::protocol::RequestKind;
use backdrop::transport::{default_socket_path, SocketDiscriminator};
use backdrop::ControlClient;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let paths: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    let Some(last) = paths.last() else {
        eprintln!("usage: setwall IMAGE...");
        std::process::exit(2);
    };

    let socket = std::env::var_os("BACKDROP_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|| default_socket_path(SocketDiscriminator::Display));
    let mut client = ControlClient::connect(&socket).await?;

    for path in &paths {
        let reply = client
            .request(RequestKind::Load, path.as_os_str().as_bytes())
            .await?;
        println!("load {}: {}", path.display(), reply.message());
    }

    let reply = client
        .request(RequestKind::Set, last.as_os_str().as_bytes())
        .await?;
    if !reply.is_success() {
        eprintln!("set {}: {}", last.display(), reply.message());
        std::process::exit(1);
    }
    println!("wallpaper is now {}", last.display());
    Ok(())
}
