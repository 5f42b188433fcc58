//! Image decoding collaborator.

use std::path::Path;

use image::{ImageReader, RgbaImage};

use crate::error::{BackdropError, Result};

/// Turns a file into an in-memory artifact.
pub trait Decode {
    type Artifact;

    /// Decode the file at `path`.
    ///
    /// Must not return a partial artifact: any failure is an error.
    fn decode(&self, path: &Path) -> Result<Self::Artifact>;
}

/// A decoded image ready for placement and painting.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pixels: RgbaImage,
}

impl Artifact {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// Decoder backed by the `image` crate (PNG and JPEG).
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageDecoder;

impl Decode for ImageDecoder {
    type Artifact = Artifact;

    fn decode(&self, path: &Path) -> Result<Artifact> {
        let failed = |reason: String| BackdropError::Decode {
            path: path.to_path_buf(),
            reason,
        };

        let reader = ImageReader::open(path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|e| failed(e.to_string()))?;
        let image = reader.decode().map_err(|e| failed(e.to_string()))?;

        if image.width() == 0 || image.height() == 0 {
            return Err(failed("image has no pixels".to_string()));
        }

        Ok(Artifact::new(image.into_rgba8()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_decode_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        RgbaImage::from_pixel(3, 2, Rgba([255, 0, 0, 255]))
            .save(&path)
            .unwrap();

        let artifact = ImageDecoder.decode(&path).unwrap();

        assert_eq!((artifact.width(), artifact.height()), (3, 2));
        assert_eq!(artifact.pixels().get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_decode_missing_file() {
        let err = ImageDecoder
            .decode(Path::new("/nonexistent/backdrop/wall.png"))
            .unwrap_err();
        assert!(matches!(err, BackdropError::Decode { .. }));
    }

    #[test]
    fn test_decode_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.png");
        std::fs::write(&path, b"definitely not an image").unwrap();

        assert!(ImageDecoder.decode(&path).is_err());
    }
}
