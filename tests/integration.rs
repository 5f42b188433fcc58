//! Integration tests for backdrop.
//!
//! Each test binds a real Unix socket in a temporary directory and drives the
//! daemon with [`ControlClient`]. The client script is the server's shutdown
//! future, so the server stops as soon as the script finishes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use image::{Rgba, RgbaImage};
use tokio::io::AsyncWriteExt;
use tokio::time::{sleep, timeout};

use backdrop::daemon::{self, WallpaperState};
use backdrop::protocol::{build_frame, Header, Reply, ReplyKind, RequestKind};
use backdrop::render::{CanvasPainter, PlacementMode, Target};
use backdrop::{BackdropError, ControlClient, Result, Server};

type State = WallpaperState<CanvasPainter>;

const TIMEOUT: Duration = Duration::from_secs(5);

fn write_png(path: &Path, width: u32, height: u32) {
    RgbaImage::from_pixel(width, height, Rgba([200, 100, 50, 255]))
        .save(path)
        .unwrap();
}

fn state() -> State {
    WallpaperState::new(CanvasPainter::new())
        .targets(vec![Target::new("eDP-1", 32, 18)])
        .mode(PlacementMode::Fit)
}

async fn bind_daemon(socket: &Path) -> Server<State> {
    Server::builder()
        .socket_path(socket)
        .handlers(daemon::handlers())
        .bind(state())
        .await
        .unwrap()
}

async fn connect(socket: &Path) -> ControlClient {
    ControlClient::connect(socket).await.unwrap()
}

async fn request(client: &mut ControlClient, kind: RequestKind, payload: &[u8]) -> Reply {
    timeout(TIMEOUT, client.request(kind, payload))
        .await
        .expect("reply timed out")
        .unwrap()
}

async fn read_reply(client: &mut ControlClient) -> Result<Reply> {
    timeout(TIMEOUT, client.read_reply())
        .await
        .expect("reply timed out")
}

fn path_bytes(path: &Path) -> Vec<u8> {
    path.to_str().unwrap().as_bytes().to_vec()
}

struct Fixture {
    _dir: tempfile::TempDir,
    socket: PathBuf,
    image: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("backdrop.sock");
    let image = dir.path().join("wall.png");
    write_png(&image, 16, 16);
    Fixture {
        _dir: dir,
        socket,
        image,
    }
}

#[tokio::test]
async fn test_set_valid_image_replies_ok() {
    let fx = fixture();
    let server = bind_daemon(&fx.socket).await;

    let state = server
        .serve(async {
            let mut client = connect(&fx.socket).await;
            let reply = request(&mut client, RequestKind::Set, &path_bytes(&fx.image)).await;
            assert_eq!(reply.kind, ReplyKind::Success);
            assert_eq!(&reply.payload[..], b"OK\0");
            assert_eq!(reply.message(), "OK");
        })
        .await
        .unwrap();

    assert_eq!(state.active(), Some(fx.image.as_path()));
    assert_eq!(state.cache().len(), 1);

    // 16x16 fitted into 32x18: pillarboxed, image in the middle.
    let canvas = state.painter().canvas("eDP-1").unwrap();
    assert_eq!(*canvas.get_pixel(16, 9), Rgba([200, 100, 50, 255]));
    assert_eq!(*canvas.get_pixel(0, 9), Rgba([0, 0, 0, 255]));
}

#[tokio::test]
async fn test_set_missing_file_replies_failure() {
    let fx = fixture();
    let server = bind_daemon(&fx.socket).await;
    let missing = fx.socket.with_file_name("missing.png");

    let state = server
        .serve(async {
            let mut client = connect(&fx.socket).await;
            let reply = request(&mut client, RequestKind::Set, &path_bytes(&missing)).await;
            assert_eq!(reply.kind, ReplyKind::Failure);
            assert!(reply.message().contains("missing.png"));

            // The connection survives a failed request.
            let reply = request(&mut client, RequestKind::Set, &path_bytes(&fx.image)).await;
            assert!(reply.is_success());
        })
        .await
        .unwrap();

    assert_eq!(state.active(), Some(fx.image.as_path()));
}

#[tokio::test]
async fn test_flush_replies_ok_and_empties_cache() {
    let fx = fixture();
    let server = bind_daemon(&fx.socket).await;

    let state = server
        .serve(async {
            let mut client = connect(&fx.socket).await;
            let reply = request(&mut client, RequestKind::Load, &path_bytes(&fx.image)).await;
            assert!(reply.is_success());

            let reply = request(&mut client, RequestKind::Flush, b"").await;
            assert!(reply.is_success());
            assert_eq!(reply.message(), "OK");
        })
        .await
        .unwrap();

    assert!(state.cache().is_empty());
    assert_eq!(state.active(), None);
}

#[tokio::test]
async fn test_fragmented_request_is_reassembled() {
    let fx = fixture();
    let server = bind_daemon(&fx.socket).await;

    server
        .serve(async {
            let mut client = connect(&fx.socket).await;
            let payload = path_bytes(&fx.image);
            let frame = build_frame(&Header::new(payload.len() as u32, RequestKind::Set), &payload);

            for chunk in frame.chunks(3) {
                client.stream_mut().write_all(chunk).await.unwrap();
                sleep(Duration::from_millis(2)).await;
            }

            let reply = read_reply(&mut client).await.unwrap();
            assert!(reply.is_success());
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_pipelined_requests_are_answered_in_order() {
    let fx = fixture();
    let server = bind_daemon(&fx.socket).await;
    let missing = fx.socket.with_file_name("missing.png");

    server
        .serve(async {
            let mut client = connect(&fx.socket).await;
            let mut bytes = Vec::new();
            for (kind, payload) in [
                (RequestKind::Load, path_bytes(&fx.image)),
                (RequestKind::Set, path_bytes(&missing)),
                (RequestKind::Flush, Vec::new()),
            ] {
                bytes.extend(build_frame(&Header::new(payload.len() as u32, kind), &payload));
            }
            client.stream_mut().write_all(&bytes).await.unwrap();

            let kinds: Vec<ReplyKind> = [
                read_reply(&mut client).await.unwrap(),
                read_reply(&mut client).await.unwrap(),
                read_reply(&mut client).await.unwrap(),
            ]
            .iter()
            .map(|reply| reply.kind)
            .collect();
            assert_eq!(
                kinds,
                vec![ReplyKind::Success, ReplyKind::Failure, ReplyKind::Success]
            );
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unknown_type_closes_only_that_connection() {
    let fx = fixture();
    let server = bind_daemon(&fx.socket).await;

    let state = server
        .serve(async {
            let mut bad = connect(&fx.socket).await;
            let mut good = connect(&fx.socket).await;

            bad.stream_mut()
                .write_all(&build_frame(&Header::new(0, 9u32), b""))
                .await
                .unwrap();
            assert!(read_reply(&mut bad).await.is_err());

            let reply = request(&mut good, RequestKind::Set, &path_bytes(&fx.image)).await;
            assert!(reply.is_success());
        })
        .await
        .unwrap();

    assert_eq!(state.cache().len(), 1);
}

#[tokio::test]
async fn test_oversize_request_closes_connection() {
    let fx = fixture();
    let server = bind_daemon(&fx.socket).await;

    server
        .serve(async {
            let mut client = connect(&fx.socket).await;
            client
                .stream_mut()
                .write_all(&Header::new(1 << 20, RequestKind::Set).encode())
                .await
                .unwrap();

            assert!(matches!(
                read_reply(&mut client).await,
                Err(BackdropError::ConnectionClosed)
            ));
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unregistered_kind_is_dropped_and_connection_stays_open() {
    let fx = fixture();
    let server = Server::builder()
        .socket_path(&fx.socket)
        .handle(RequestKind::Set, |count: &mut u32, _, ctx| {
            *count += 1;
            ctx.ok()
        })
        .bind(0u32)
        .await
        .unwrap();

    let count = server
        .serve(async {
            let mut client = connect(&fx.socket).await;
            client.send(RequestKind::Flush, b"").await.unwrap();

            // The only reply on the wire belongs to the Set.
            let reply = request(&mut client, RequestKind::Set, b"x").await;
            assert!(reply.is_success());
        })
        .await
        .unwrap();

    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_reply_over_buffer_cap_closes_connection() {
    let fx = fixture();
    let server = Server::builder()
        .socket_path(&fx.socket)
        .max_reply_buffer(8)
        .handlers(daemon::handlers())
        .bind(state())
        .await
        .unwrap();

    server
        .serve(async {
            let mut client = connect(&fx.socket).await;
            client.send(RequestKind::Flush, b"").await.unwrap();
            assert!(read_reply(&mut client).await.is_err());
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_half_closed_peer_still_gets_reply() {
    let fx = fixture();
    let server = bind_daemon(&fx.socket).await;

    server
        .serve(async {
            let mut client = connect(&fx.socket).await;
            client.send(RequestKind::Flush, b"").await.unwrap();
            client.stream_mut().shutdown().await.unwrap();

            let reply = read_reply(&mut client).await.unwrap();
            assert!(reply.is_success());
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_shutdown_removes_socket_file() {
    let fx = fixture();
    let server = bind_daemon(&fx.socket).await;
    assert!(fx.socket.exists());

    let mut lingering = None;
    server
        .serve(async {
            let mut client = connect(&fx.socket).await;
            let reply = request(&mut client, RequestKind::Flush, b"").await;
            assert!(reply.is_success());
            lingering = Some(client);
        })
        .await
        .unwrap();

    assert!(!fx.socket.exists());

    // Connections still open at shutdown are closed with the server.
    let mut client = lingering.unwrap();
    assert!(read_reply(&mut client).await.is_err());
}
