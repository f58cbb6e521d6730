use serde::{Deserialize, Serialize};
use std::fmt;

/// Linear RGBA color with f32 components in [0.0, 1.0].
///
/// Serialized as a `[r, g, b, a]` array. Deserialization also accepts
/// `[r, g, b]` (opaque) and `"#RRGGBB"` / `"#RRGGBBAA"` hex strings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ColorRepr", into = "[f32; 4]")]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColorRepr {
    Rgba([f32; 4]),
    Rgb([f32; 3]),
    Hex(String),
}

impl TryFrom<ColorRepr> for Color {
    type Error = ColorError;

    fn try_from(repr: ColorRepr) -> Result<Self, Self::Error> {
        match repr {
            ColorRepr::Rgba([r, g, b, a]) => Ok(Color::rgba(r, g, b, a)),
            ColorRepr::Rgb([r, g, b]) => Ok(Color::rgb(r, g, b)),
            ColorRepr::Hex(s) => Color::from_hex(&s),
        }
    }
}

impl From<Color> for [f32; 4] {
    fn from(c: Color) -> Self {
        [c.r, c.g, c.b, c.a]
    }
}

impl Color {
    pub fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque RGB color (alpha = 1.0).
    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Parse `"#RRGGBB"` or `"#RRGGBBAA"`.
    pub fn from_hex(hex: &str) -> Result<Self, ColorError> {
        let hex = hex.trim_start_matches('#');
        if !matches!(hex.len(), 6 | 8) {
            return Err(ColorError::InvalidHex);
        }
        let channel = |i: usize| -> Result<f32, ColorError> {
            let v = u8::from_str_radix(hex.get(i..i + 2).ok_or(ColorError::InvalidHex)?, 16)
                .map_err(|_| ColorError::InvalidHex)?;
            Ok(v as f32 / 255.0)
        };
        let a = if hex.len() == 8 { channel(6)? } else { 1.0 };
        Ok(Self::rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }

    pub fn to_array(self) -> [f32; 4] {
        self.into()
    }

    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({:.3}, {:.3}, {:.3}, {:.3})", self.r, self.g, self.b, self.a)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColorError {
    InvalidHex,
}

impl fmt::Display for ColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorError::InvalidHex => write!(f, "invalid hex color string"),
        }
    }
}

impl std::error::Error for ColorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex() {
        let c = Color::from_hex("#FF0000").unwrap();
        assert!((c.r - 1.0).abs() < 0.001);
        assert!((c.g - 0.0).abs() < 0.001);
        assert!((c.a - 1.0).abs() < 0.001);

        let c = Color::from_hex("00000080").unwrap();
        assert!((c.a - 0.502).abs() < 0.001);

        assert!(Color::from_hex("#12345").is_err());
        assert!(Color::from_hex("#GG0000").is_err());
    }

    #[test]
    fn test_deserialize_forms() {
        let c: Color = serde_json::from_str("[0.03, 0.03, 0.03, 1.0]").unwrap();
        assert!((c.r - 0.03).abs() < 1e-6);
        let c: Color = serde_json::from_str("[0.5, 0.25, 1.0]").unwrap();
        assert_eq!(c.a, 1.0);
        let c: Color = serde_json::from_str("\"#ffffff\"").unwrap();
        assert_eq!(c, Color::WHITE);
    }

    #[test]
    fn test_serializes_as_array() {
        let json = serde_json::to_string(&Color::rgba(0.5, 0.25, 0.0, 1.0)).unwrap();
        assert_eq!(json, "[0.5,0.25,0.0,1.0]");
    }
}
