//! Paint collaborator.
//!
//! The daemon decides *what* to draw; a [`Paint`] implementation draws it.
//! [`CanvasPainter`] keeps one in-memory RGBA canvas per target.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::RgbaImage;

use super::color::Color;
use super::placement::{Placement, Transform};
use crate::cache::Artifact;
use crate::error::BackdropError;

/// A named paint area, one per output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl Target {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}x{}", self.name, self.width, self.height)
    }
}

/// Parses `NAME:WIDTHxHEIGHT`, e.g. `eDP-1:1920x1080`.
impl FromStr for Target {
    type Err = BackdropError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BackdropError::InvalidTarget(format!("{s:?}, expected NAME:WxH"));

        let (name, size) = s.rsplit_once(':').ok_or_else(invalid)?;
        let (width, height) = size.split_once('x').ok_or_else(invalid)?;
        let width: u32 = width.parse().map_err(|_| invalid())?;
        let height: u32 = height.parse().map_err(|_| invalid())?;
        if name.is_empty() || width == 0 || height == 0 {
            return Err(invalid());
        }

        Ok(Self::new(name, width, height))
    }
}

/// Draws onto targets.
pub trait Paint {
    /// Cover the whole target with `color`.
    fn fill(&mut self, target: &Target, color: Color);

    /// Draw `artifact` onto the target as described by `placement`.
    fn paint(&mut self, target: &Target, placement: Placement, artifact: &Artifact);
}

/// [`Paint`] into in-memory canvases.
///
/// With a snapshot directory set, each canvas is written to
/// `<dir>/<target name>.png` after every operation.
#[derive(Debug, Default)]
pub struct CanvasPainter {
    canvases: HashMap<String, RgbaImage>,
    snapshot_dir: Option<PathBuf>,
}

impl CanvasPainter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            canvases: HashMap::new(),
            snapshot_dir: Some(dir.into()),
        }
    }

    /// Current contents of the canvas for `name`.
    pub fn canvas(&self, name: &str) -> Option<&RgbaImage> {
        self.canvases.get(name)
    }

    fn canvas_for(&mut self, target: &Target) -> &mut RgbaImage {
        let canvas = self
            .canvases
            .entry(target.name.clone())
            .or_insert_with(|| RgbaImage::new(target.width, target.height));
        if canvas.dimensions() != (target.width, target.height) {
            *canvas = RgbaImage::new(target.width, target.height);
        }
        canvas
    }

    fn snapshot(&self, target: &Target) {
        let (Some(dir), Some(canvas)) = (&self.snapshot_dir, self.canvases.get(&target.name)) else {
            return;
        };

        let path = snapshot_path(dir, &target.name);
        match canvas.save(&path) {
            Ok(()) => tracing::debug!("Wrote snapshot {}", path.display()),
            Err(e) => tracing::warn!("Unable to write snapshot {}: {}", path.display(), e),
        }
    }
}

impl Paint for CanvasPainter {
    fn fill(&mut self, target: &Target, color: Color) {
        *self.canvas_for(target) = RgbaImage::from_pixel(target.width, target.height, color.to_rgba());
        self.snapshot(target);
    }

    fn paint(&mut self, target: &Target, placement: Placement, artifact: &Artifact) {
        let canvas = self.canvas_for(target);
        let pixels = artifact.pixels();

        match placement {
            Placement::Transform(transform) => {
                if let Some(visible) = VisibleRegion::of(&transform, artifact, target) {
                    let source = imageops::crop_imm(
                        pixels,
                        visible.src_x,
                        visible.src_y,
                        visible.src_width,
                        visible.src_height,
                    );

                    if (visible.width, visible.height) == (visible.src_width, visible.src_height) {
                        imageops::overlay(canvas, &*source, visible.x, visible.y);
                    } else {
                        let scaled = imageops::resize(
                            &*source,
                            visible.width,
                            visible.height,
                            FilterType::Triangle,
                        );
                        imageops::overlay(canvas, &scaled, visible.x, visible.y);
                    }
                }
            }
            Placement::Tile => {
                let (step_x, step_y) = (artifact.width() as usize, artifact.height() as usize);
                for y in (0..target.height).step_by(step_y.max(1)) {
                    for x in (0..target.width).step_by(step_x.max(1)) {
                        imageops::overlay(canvas, pixels, i64::from(x), i64::from(y));
                    }
                }
            }
        }

        self.snapshot(target);
    }
}

/// The part of a transformed artifact that lands on a target.
///
/// Only this source rectangle is resampled, so the scaled buffer never
/// exceeds the target by more than one source pixel per side.
#[derive(Debug, Clone, Copy, PartialEq)]
struct VisibleRegion {
    src_x: u32,
    src_y: u32,
    src_width: u32,
    src_height: u32,
    /// Where the scaled rectangle is drawn, in target pixels.
    x: i64,
    y: i64,
    width: u32,
    height: u32,
}

impl VisibleRegion {
    fn of(transform: &Transform, artifact: &Artifact, target: &Target) -> Option<Self> {
        let (src_x, src_width, x, width) = visible_span(
            transform.offset_x,
            transform.scale_x,
            artifact.width(),
            target.width,
        )?;
        let (src_y, src_height, y, height) = visible_span(
            transform.offset_y,
            transform.scale_y,
            artifact.height(),
            target.height,
        )?;

        Some(Self {
            src_x,
            src_y,
            src_width,
            src_height,
            x,
            y,
            width,
            height,
        })
    }
}

/// One axis of [`VisibleRegion`]: source start and length, then destination
/// start and length. `None` when nothing lands on the target.
fn visible_span(offset: f64, scale: f64, len: u32, target: u32) -> Option<(u32, u32, i64, u32)> {
    if !scale.is_finite() || scale <= 0.0 {
        return None;
    }

    // Target pixel t shows source coordinate t / scale - offset.
    let start = (-offset).max(0.0).floor();
    let end = (f64::from(target) / scale - offset).min(f64::from(len)).ceil();
    if end <= start {
        return None;
    }

    let dest_start = ((start + offset) * scale).round();
    let dest_len = ((end - start) * scale).round();
    if dest_len < 1.0 {
        return None;
    }

    Some((start as u32, (end - start) as u32, dest_start as i64, dest_len as u32))
}

fn snapshot_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.png", name.replace('/', "_")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::placement::{compute_placement, PlacementMode};
    use image::Rgba;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn solid(width: u32, height: u32, pixel: Rgba<u8>) -> Artifact {
        Artifact::new(RgbaImage::from_pixel(width, height, pixel))
    }

    #[test]
    fn test_target_parse() {
        let target: Target = "HDMI-A-1:2560x1440".parse().unwrap();
        assert_eq!(target, Target::new("HDMI-A-1", 2560, 1440));
        assert_eq!(target.to_string(), "HDMI-A-1:2560x1440");
    }

    #[test]
    fn test_target_parse_rejects_malformed() {
        for input in ["eDP-1", "eDP-1:1920", ":10x10", "a:0x10", "a:10xten"] {
            assert!(input.parse::<Target>().is_err(), "{input:?}");
        }
    }

    #[test]
    fn test_fill_covers_canvas() {
        let mut painter = CanvasPainter::new();
        let target = Target::new("out", 4, 3);

        painter.fill(&target, Color::rgb(0, 0, 255));

        let canvas = painter.canvas("out").unwrap();
        assert_eq!(canvas.dimensions(), (4, 3));
        assert!(canvas.pixels().all(|p| *p == BLUE));
    }

    #[test]
    fn test_center_draws_unscaled_in_middle() {
        let mut painter = CanvasPainter::new();
        let target = Target::new("out", 10, 10);
        let artifact = solid(2, 2, RED);

        painter.fill(&target, Color::rgb(0, 0, 255));
        let placement = compute_placement(PlacementMode::Center, 2, 2, 10, 10);
        painter.paint(&target, placement, &artifact);

        let canvas = painter.canvas("out").unwrap();
        assert_eq!(*canvas.get_pixel(4, 4), RED);
        assert_eq!(*canvas.get_pixel(5, 5), RED);
        assert_eq!(*canvas.get_pixel(3, 3), BLUE);
        assert_eq!(*canvas.get_pixel(6, 6), BLUE);
    }

    #[test]
    fn test_fit_leaves_bars() {
        let mut painter = CanvasPainter::new();
        let target = Target::new("out", 20, 10);
        let artifact = solid(4, 4, RED);

        painter.fill(&target, Color::rgb(0, 0, 255));
        let placement = compute_placement(PlacementMode::Fit, 4, 4, 20, 10);
        painter.paint(&target, placement, &artifact);

        let canvas = painter.canvas("out").unwrap();
        assert_eq!(*canvas.get_pixel(0, 5), BLUE);
        assert_eq!(*canvas.get_pixel(19, 5), BLUE);
        assert_eq!(*canvas.get_pixel(10, 5), RED);
    }

    #[test]
    fn test_stretch_covers_canvas() {
        let mut painter = CanvasPainter::new();
        let target = Target::new("out", 9, 5);
        let artifact = solid(3, 3, RED);

        painter.fill(&target, Color::BLACK);
        let placement = compute_placement(PlacementMode::Stretch, 3, 3, 9, 5);
        painter.paint(&target, placement, &artifact);

        assert!(painter.canvas("out").unwrap().pixels().all(|p| *p == RED));
    }

    #[test]
    fn test_fill_extreme_aspect_stays_within_target() {
        let mut painter = CanvasPainter::new();
        let target = Target::new("out", 1920, 1080);
        let artifact = solid(1, 60000, RED);

        painter.fill(&target, Color::BLACK);
        let placement = compute_placement(PlacementMode::Fill, 1, 60000, 1920, 1080);
        painter.paint(&target, placement, &artifact);

        let canvas = painter.canvas("out").unwrap();
        assert_eq!(canvas.dimensions(), (1920, 1080));
        assert!(canvas.pixels().all(|p| *p == RED));
    }

    #[test]
    fn test_fill_crops_to_middle_of_artifact() {
        let mut painter = CanvasPainter::new();
        let target = Target::new("out", 4, 2);
        // Red top half, blue bottom half; only the seam lands on the target.
        let mut pixels = RgbaImage::from_pixel(2, 8, BLUE);
        for y in 0..4 {
            for x in 0..2 {
                pixels.put_pixel(x, y, RED);
            }
        }
        let artifact = Artifact::new(pixels);

        let placement = compute_placement(PlacementMode::Fill, 2, 8, 4, 2);
        painter.paint(&target, placement, &artifact);

        let canvas = painter.canvas("out").unwrap();
        let top = canvas.get_pixel(1, 0);
        let bottom = canvas.get_pixel(1, 1);
        assert!(top[0] > top[2], "{top:?}");
        assert!(bottom[2] > bottom[0], "{bottom:?}");
    }

    #[test]
    fn test_visible_span_of_offscreen_artifact_is_empty() {
        // Centred 4-pixel artifact on a 10-pixel target starts at 3 and ends at 7.
        assert_eq!(visible_span(3.0, 1.0, 4, 10), Some((0, 4, 3, 4)));
        // Shifted entirely past the target edge.
        assert_eq!(visible_span(12.0, 1.0, 4, 10), None);
        assert_eq!(visible_span(-5.0, 1.0, 4, 10), None);
    }

    #[test]
    fn test_tile_repeats_from_origin() {
        let mut painter = CanvasPainter::new();
        let target = Target::new("out", 5, 3);
        let mut pixels = RgbaImage::from_pixel(2, 2, BLUE);
        pixels.put_pixel(0, 0, RED);
        let artifact = Artifact::new(pixels);

        painter.fill(&target, Color::BLACK);
        painter.paint(&target, Placement::Tile, &artifact);

        let canvas = painter.canvas("out").unwrap();
        for (x, y) in [(0, 0), (2, 0), (4, 0), (0, 2), (4, 2)] {
            assert_eq!(*canvas.get_pixel(x, y), RED, "({x}, {y})");
        }
        assert_eq!(*canvas.get_pixel(1, 1), BLUE);
        assert_eq!(*canvas.get_pixel(3, 2), BLUE);
    }

    #[test]
    fn test_resized_target_gets_new_canvas() {
        let mut painter = CanvasPainter::new();
        painter.fill(&Target::new("out", 4, 4), Color::BLACK);
        painter.fill(&Target::new("out", 8, 2), Color::BLACK);

        assert_eq!(painter.canvas("out").unwrap().dimensions(), (8, 2));
    }

    #[test]
    fn test_snapshot_written_per_target() {
        let dir = tempfile::tempdir().unwrap();
        let mut painter = CanvasPainter::with_snapshot_dir(dir.path());

        painter.fill(&Target::new("DP/1", 3, 2), Color::rgb(0, 0, 255));

        let saved = image::open(dir.path().join("DP_1.png")).unwrap().into_rgba8();
        assert_eq!(saved.dimensions(), (3, 2));
        assert_eq!(*saved.get_pixel(2, 1), BLUE);
    }
}
