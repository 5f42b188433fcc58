//! Render module - turning an artifact into pixels on a target.
//!
//! Provides:
//! - [`compute_placement`] - scale/offset (or tiling) for a placement mode
//! - [`Color`] - solid background colour
//! - [`Paint`] / [`CanvasPainter`] - the paint collaborator and an in-memory implementation

mod color;
mod paint;
mod placement;

pub use color::Color;
pub use paint::{CanvasPainter, Paint, Target};
pub use placement::{compute_placement, Placement, PlacementMode, Transform};
