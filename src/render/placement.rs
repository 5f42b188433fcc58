//! Placement of an artifact onto a target area.
//!
//! [`compute_placement`] is pure geometry. Offsets are expressed in the
//! artifact's coordinate space after scaling, so the artifact's origin lands
//! at `(offset_x * scale_x, offset_y * scale_y)` in target pixels.

use std::fmt;
use std::str::FromStr;

use crate::error::BackdropError;

/// How an artifact is mapped onto a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlacementMode {
    /// Scale each axis independently to cover the target exactly.
    Stretch,
    /// Uniform scale covering the whole target, cropping the excess axis.
    #[default]
    Fill,
    /// Uniform scale showing the whole artifact, with bars on one axis.
    Fit,
    /// No scaling, centred; may crop.
    Center,
    /// No scaling, repeated from the origin.
    Tile,
    /// No artifact at all; the target is filled with the background colour.
    SolidColor,
}

impl PlacementMode {
    /// All modes, in declaration order.
    pub const ALL: [PlacementMode; 6] = [
        PlacementMode::Stretch,
        PlacementMode::Fill,
        PlacementMode::Fit,
        PlacementMode::Center,
        PlacementMode::Tile,
        PlacementMode::SolidColor,
    ];

    /// Name accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            PlacementMode::Stretch => "stretch",
            PlacementMode::Fill => "fill",
            PlacementMode::Fit => "fit",
            PlacementMode::Center => "center",
            PlacementMode::Tile => "tile",
            PlacementMode::SolidColor => "solid_color",
        }
    }
}

impl fmt::Display for PlacementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PlacementMode {
    type Err = BackdropError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.name() == s)
            .ok_or_else(|| BackdropError::InvalidMode(s.to_string()))
    }
}

/// Scale then translate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale_x: f64,
    pub scale_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Transform {
    fn uniform(scale: f64, offset_x: f64, offset_y: f64) -> Self {
        Self {
            scale_x: scale,
            scale_y: scale,
            offset_x,
            offset_y,
        }
    }

    /// Where the artifact's origin lands, in target pixels.
    pub fn origin(&self) -> (f64, f64) {
        (self.offset_x * self.scale_x, self.offset_y * self.scale_y)
    }
}

/// Result of [`compute_placement`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    Transform(Transform),
    /// Repeat the artifact unscaled across the target, starting at the origin.
    Tile,
}

/// Compute how an `artifact_w` x `artifact_h` artifact is placed on a
/// `target_w` x `target_h` target.
///
/// # Panics
///
/// Panics on [`PlacementMode::SolidColor`]. Callers fill solid colours
/// before reaching this function.
pub fn compute_placement(
    mode: PlacementMode,
    artifact_w: u32,
    artifact_h: u32,
    target_w: u32,
    target_h: u32,
) -> Placement {
    let (aw, ah) = (f64::from(artifact_w), f64::from(artifact_h));
    let (tw, th) = (f64::from(target_w), f64::from(target_h));

    let transform = match mode {
        PlacementMode::Stretch => Transform {
            scale_x: tw / aw,
            scale_y: th / ah,
            offset_x: 0.0,
            offset_y: 0.0,
        },
        PlacementMode::Fill => {
            if tw / th > aw / ah {
                let scale = tw / aw;
                Transform::uniform(scale, 0.0, th / 2.0 / scale - ah / 2.0)
            } else {
                let scale = th / ah;
                Transform::uniform(scale, tw / 2.0 / scale - aw / 2.0, 0.0)
            }
        }
        PlacementMode::Fit => {
            if tw / th > aw / ah {
                let scale = th / ah;
                Transform::uniform(scale, tw / 2.0 / scale - aw / 2.0, 0.0)
            } else {
                let scale = tw / aw;
                Transform::uniform(scale, 0.0, th / 2.0 / scale - ah / 2.0)
            }
        }
        PlacementMode::Center => {
            Transform::uniform(1.0, tw / 2.0 - aw / 2.0, th / 2.0 - ah / 2.0)
        }
        PlacementMode::Tile => return Placement::Tile,
        PlacementMode::SolidColor => {
            panic!("solid colour has no placement; fill the target instead")
        }
    };

    Placement::Transform(transform)
}
