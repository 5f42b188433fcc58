//! Wallpaper state shared by every control connection, and the handlers
//! for Set, Load and Flush requests.

use std::path::{Path, PathBuf};

use crate::cache::{self, Artifact, Decode, ImageCache, ImageDecoder};
use crate::error::Result;
use crate::handler::{HandlerRegistry, HandlerResult, RequestContext};
use crate::protocol::RequestKind;
use crate::render::{compute_placement, Color, Paint, PlacementMode, Target};

/// The wallpaper as requested, and the file it resolved to.
#[derive(Debug, Clone)]
struct ActiveWallpaper {
    path: PathBuf,
    canonical: PathBuf,
}

impl ActiveWallpaper {
    /// Whether `canonical` names this wallpaper. The requested path is
    /// resolved again so a retargeted symlink follows its new file.
    fn resolves_to(&self, canonical: &Path) -> bool {
        let current = cache::resolve(&self.path).unwrap_or_else(|_| self.canonical.clone());
        current == canonical
    }
}

/// Everything the daemon paints from.
pub struct WallpaperState<P, D = ImageDecoder>
where
    D: Decode<Artifact = Artifact>,
{
    cache: ImageCache<D>,
    painter: P,
    targets: Vec<Target>,
    active: Option<ActiveWallpaper>,
    mode: PlacementMode,
    color: Color,
}

impl<P: Paint> WallpaperState<P> {
    /// State decoding through [`ImageDecoder`].
    pub fn new(painter: P) -> Self {
        Self::with_decoder(painter, ImageDecoder)
    }
}

impl<P, D> WallpaperState<P, D>
where
    P: Paint,
    D: Decode<Artifact = Artifact>,
{
    pub fn with_decoder(painter: P, decoder: D) -> Self {
        Self {
            cache: ImageCache::new(decoder),
            painter,
            targets: Vec::new(),
            active: None,
            mode: PlacementMode::default(),
            color: Color::default(),
        }
    }

    pub fn targets(mut self, targets: Vec<Target>) -> Self {
        self.targets = targets;
        self
    }

    pub fn mode(mut self, mode: PlacementMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Make `path` the active wallpaper and repaint every target.
    ///
    /// On error the previous wallpaper stays active and nothing is painted.
    pub fn set_wallpaper(&mut self, path: &Path) -> Result<()> {
        let artifact = self.cache.resolve_and_load(path)?;
        let canonical = cache::resolve(path)?;
        tracing::info!("Wallpaper set to {}", path.display());
        self.active = Some(ActiveWallpaper {
            path: path.to_path_buf(),
            canonical,
        });
        self.paint_all(Some(&*artifact));
        Ok(())
    }

    /// Decode or revalidate `path`; repaint if it resolves to the active
    /// wallpaper, whichever path it was set through.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let artifact = self.cache.resolve_and_load(path)?;
        let canonical = cache::resolve(path)?;
        if self.active.as_ref().is_some_and(|active| active.resolves_to(&canonical)) {
            tracing::debug!("{} is the active wallpaper, repainting", path.display());
            self.paint_all(Some(&*artifact));
        }
        Ok(())
    }

    /// Drop every cached image. The canvases keep what was painted.
    pub fn flush(&mut self) {
        self.cache.flush();
    }

    /// Paint every target from the current state.
    ///
    /// An active wallpaper that can no longer be loaded falls back to the
    /// background colour.
    pub fn repaint(&mut self) {
        let artifact = match (&self.active, self.mode) {
            (Some(active), mode) if mode != PlacementMode::SolidColor => {
                match self.cache.resolve_and_load(&active.path) {
                    Ok(artifact) => Some(artifact),
                    Err(e) => {
                        tracing::warn!("{}, painting background colour only", e);
                        None
                    }
                }
            }
            _ => None,
        };
        self.paint_all(artifact.as_deref());
    }

    fn paint_all(&mut self, artifact: Option<&Artifact>) {
        for target in &self.targets {
            self.painter.fill(target, self.color);

            let Some(artifact) = artifact else { continue };
            if self.mode == PlacementMode::SolidColor {
                continue;
            }
            let placement = compute_placement(
                self.mode,
                artifact.width(),
                artifact.height(),
                target.width,
                target.height,
            );
            self.painter.paint(target, placement, artifact);
        }
        tracing::debug!("Repainted {} target(s)", self.targets.len());
    }

    /// The active wallpaper, as it was requested.
    pub fn active(&self) -> Option<&Path> {
        self.active.as_ref().map(|active| active.path.as_path())
    }

    pub fn placement_mode(&self) -> PlacementMode {
        self.mode
    }

    pub fn background(&self) -> Color {
        self.color
    }

    pub fn outputs(&self) -> &[Target] {
        &self.targets
    }

    pub fn cache(&self) -> &ImageCache<D> {
        &self.cache
    }

    pub fn painter(&self) -> &P {
        &self.painter
    }
}

/// Registry with the Set, Load and Flush handlers.
pub fn handlers<P, D>() -> HandlerRegistry<WallpaperState<P, D>>
where
    P: Paint + 'static,
    D: Decode<Artifact = Artifact> + 'static,
{
    let mut registry = HandlerRegistry::new();
    registry.register(RequestKind::Set, handle_set::<P, D>);
    registry.register(RequestKind::Load, handle_load::<P, D>);
    registry.register(RequestKind::Flush, handle_flush::<P, D>);
    registry
}

fn handle_set<P, D>(
    state: &mut WallpaperState<P, D>,
    payload: &[u8],
    ctx: RequestContext<'_>,
) -> HandlerResult
where
    P: Paint,
    D: Decode<Artifact = Artifact>,
{
    let path = match payload_path(payload) {
        Ok(path) => path,
        Err(message) => return ctx.error(message),
    };
    match state.set_wallpaper(&path) {
        Ok(()) => ctx.ok(),
        Err(e) => ctx.error(&e.to_string()),
    }
}

fn handle_load<P, D>(
    state: &mut WallpaperState<P, D>,
    payload: &[u8],
    ctx: RequestContext<'_>,
) -> HandlerResult
where
    P: Paint,
    D: Decode<Artifact = Artifact>,
{
    let path = match payload_path(payload) {
        Ok(path) => path,
        Err(message) => return ctx.error(message),
    };
    match state.load(&path) {
        Ok(()) => ctx.ok(),
        Err(e) => ctx.error(&e.to_string()),
    }
}

fn handle_flush<P, D>(
    state: &mut WallpaperState<P, D>,
    _payload: &[u8],
    ctx: RequestContext<'_>,
) -> HandlerResult
where
    P: Paint,
    D: Decode<Artifact = Artifact>,
{
    state.flush();
    ctx.ok()
}

/// Path carried by a Set or Load payload.
///
/// The payload ends at its first NUL, if any.
fn payload_path(payload: &[u8]) -> std::result::Result<PathBuf, &'static str> {
    let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
    let path = std::str::from_utf8(&payload[..end]).map_err(|_| "path is not valid UTF-8")?;
    if path.is_empty() {
        return Err("empty path");
    }
    Ok(PathBuf::from(path))
}
