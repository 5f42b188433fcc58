//! `backdrop` - wallpaper daemon and its control client.
//!
//! - `backdrop serve ...` runs the daemon
//! - `backdrop msg set|load PATH` / `backdrop msg flush` talks to a running one

use std::os::unix::ffi::OsStringExt;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::signal::unix::{signal, SignalKind};

use backdrop::client::ControlClient;
use backdrop::control::announce_ready;
use backdrop::daemon::{self, WallpaperState};
use backdrop::protocol::RequestKind;
use backdrop::render::{CanvasPainter, Color, PlacementMode, Target};
use backdrop::session::{SessionLimits, DEFAULT_MAX_REPLY_BUFFER};
use backdrop::transport::{default_socket_path, SocketDiscriminator};
use backdrop::{logging, Result, Server, ServerConfig};

/// Wallpaper daemon with a local control socket.
#[derive(Parser, Debug)]
#[command(name = "backdrop")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the daemon.
    Serve(ServeArgs),

    /// Send one request to a running daemon and print its reply.
    Msg(MsgArgs),
}

#[derive(Args, Debug)]
struct SocketArgs {
    /// Control socket path.
    #[arg(long, env = "BACKDROP_SOCKET")]
    socket: Option<PathBuf>,

    /// What makes the derived socket path unique.
    #[arg(long, value_enum, default_value_t = Discriminator::Display)]
    discriminator: Discriminator,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Discriminator {
    /// `backdrop.<WAYLAND_DISPLAY>`
    Display,
    /// `backdrop.<uid>.<pid>`
    Process,
}

impl From<Discriminator> for SocketDiscriminator {
    fn from(d: Discriminator) -> Self {
        match d {
            Discriminator::Display => SocketDiscriminator::Display,
            Discriminator::Process => SocketDiscriminator::Process,
        }
    }
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[command(flatten)]
    socket: SocketArgs,

    /// Wallpaper shown at startup.
    #[arg(long)]
    image: Option<PathBuf>,

    /// stretch, fill, fit, center, tile or solid_color.
    #[arg(long, default_value = "fill")]
    mode: PlacementMode,

    /// Background colour, #RRGGBB or #RRGGBBAA.
    #[arg(long, default_value = "#000000")]
    color: Color,

    /// Output to paint, repeatable.
    #[arg(long = "output", value_name = "NAME:WxH", default_value = "default:1920x1080")]
    outputs: Vec<Target>,

    /// Write `<output>.png` here after every repaint.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Print a JSON ready line on stdout once listening.
    #[arg(long)]
    announce: bool,

    /// Per-connection reply buffer ceiling in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_REPLY_BUFFER)]
    max_reply_buffer: usize,
}

#[derive(Args, Debug)]
struct MsgArgs {
    #[command(flatten)]
    socket: SocketArgs,

    #[command(subcommand)]
    request: MsgRequest,
}

#[derive(Subcommand, Debug)]
enum MsgRequest {
    /// Make PATH the active wallpaper.
    Set { path: PathBuf },
    /// Decode or revalidate PATH in the cache.
    Load { path: PathBuf },
    /// Empty the image cache.
    Flush,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("backdrop: {err}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Serve(args) => runtime.block_on(serve(args)),
        Command::Msg(args) => runtime.block_on(msg(args)),
    };

    result.unwrap_or_else(|err| {
        eprintln!("backdrop: {err}");
        ExitCode::FAILURE
    })
}

async fn serve(args: ServeArgs) -> Result<ExitCode> {
    let painter = match &args.snapshot_dir {
        Some(dir) => CanvasPainter::with_snapshot_dir(dir),
        None => CanvasPainter::new(),
    };
    let mut state = WallpaperState::new(painter)
        .targets(args.outputs)
        .mode(args.mode)
        .color(args.color);

    match &args.image {
        Some(path) => {
            if let Err(e) = state.set_wallpaper(path) {
                tracing::warn!("{}", e);
                state.repaint();
            }
        }
        None => state.repaint(),
    }

    let config = ServerConfig {
        socket_path: args.socket.socket,
        discriminator: args.socket.discriminator.into(),
        limits: SessionLimits {
            max_reply_buffer: args.max_reply_buffer,
            ..SessionLimits::default()
        },
    };
    let server = Server::builder()
        .config(config)
        .handlers(daemon::handlers())
        .bind(state)
        .await?;

    if args.announce {
        announce_ready(server.path())?;
    }

    let state = server.serve(shutdown_signal()).await?;
    tracing::info!("Released {} cached image(s)", state.cache().len());
    Ok(ExitCode::SUCCESS)
}

async fn msg(args: MsgArgs) -> Result<ExitCode> {
    let path = args
        .socket
        .socket
        .unwrap_or_else(|| default_socket_path(args.socket.discriminator.into()));

    let (kind, payload) = match args.request {
        MsgRequest::Set { path } => (RequestKind::Set, path.into_os_string().into_vec()),
        MsgRequest::Load { path } => (RequestKind::Load, path.into_os_string().into_vec()),
        MsgRequest::Flush => (RequestKind::Flush, Vec::new()),
    };

    let mut client = ControlClient::connect(&path).await?;
    let reply = client.request(kind, &payload).await?;

    if reply.is_success() {
        println!("{}", reply.message());
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("backdrop: {}", reply.message());
        Ok(ExitCode::from(1))
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            tracing::warn!("Unable to listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}
