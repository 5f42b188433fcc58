//! Solid background colours.

use std::fmt;
use std::str::FromStr;

use image::Rgba;

use crate::error::BackdropError;

/// An RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, self.a])
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != 0xff {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

/// Parses `#RRGGBB` or `#RRGGBBAA`; the `#` is optional.
impl FromStr for Color {
    type Err = BackdropError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BackdropError::InvalidColor(s.to_string());

        let hex = s.strip_prefix('#').unwrap_or(s);
        if !matches!(hex.len(), 6 | 8) || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
            a: if hex.len() == 8 { channel(6)? } else { 0xff },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rgb() {
        assert_eq!("#1a2B3c".parse::<Color>().unwrap(), Color::rgb(0x1a, 0x2b, 0x3c));
        assert_eq!("ffffff".parse::<Color>().unwrap(), Color::rgb(255, 255, 255));
    }

    #[test]
    fn test_parse_rgba() {
        let color: Color = "#00000080".parse().unwrap();
        assert_eq!(color.a, 0x80);
        assert_eq!(color.to_rgba(), Rgba([0, 0, 0, 0x80]));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for input in ["", "#", "#fff", "#12345", "#1234567", "#gg0000", "#+10000"] {
            assert!(
                matches!(input.parse::<Color>(), Err(BackdropError::InvalidColor(_))),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Color::rgb(1, 2, 255).to_string(), "#0102ff");
        assert_eq!("#01020380".parse::<Color>().unwrap().to_string(), "#01020380");
    }
}
