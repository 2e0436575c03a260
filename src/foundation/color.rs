use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::foundation::core::Rgba8Premul;

/// Straight-alpha paint or background color as written in recipes.
///
/// Deserializes from `"#RGB"`, `"#RRGGBB"`, `"#RRGGBBAA"`, the keywords `transparent`, `black`
/// and `white`, `{"r","g","b","a"?}`, `{"h","s","l","a"?}` or `[r, g, b(, a)]`. Channels are
/// normalized to `0..=1`; hue is in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ColorRepr")]
pub struct ColorDef {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ColorParseError {
    #[error("'{0}' is not a color: expected #RGB, #RRGGBB, #RRGGBBAA or a keyword")]
    Syntax(String),
    #[error("color array needs 3 or 4 channels, got {0}")]
    Channels(usize),
}

impl ColorDef {
    pub fn rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Convert from hue (degrees), saturation and lightness.
    pub fn hsla(h: f64, s: f64, l: f64, a: f64) -> Self {
        let s = s.clamp(0.0, 1.0);
        let l = l.clamp(0.0, 1.0);
        let chroma = (1.0 - (2.0 * l - 1.0).abs()) * s;
        let sector = h.rem_euclid(360.0) / 60.0;
        let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
        let (r, g, b) = match sector as u8 {
            0 => (chroma, x, 0.0),
            1 => (x, chroma, 0.0),
            2 => (0.0, chroma, x),
            3 => (0.0, x, chroma),
            4 => (x, 0.0, chroma),
            _ => (chroma, 0.0, x),
        };
        let m = l - chroma / 2.0;
        Self::rgba(r + m, g + m, b + m, a)
    }

    /// Clamp, premultiply and quantize to 8 bits per channel.
    pub fn to_rgba8_premul(self) -> Rgba8Premul {
        let quantize = |x: f64| (x.clamp(0.0, 1.0) * 255.0).round() as u8;
        let a = self.a.clamp(0.0, 1.0);
        Rgba8Premul {
            r: quantize(self.r.clamp(0.0, 1.0) * a),
            g: quantize(self.g.clamp(0.0, 1.0) * a),
            b: quantize(self.b.clamp(0.0, 1.0) * a),
            a: quantize(a),
        }
    }

    fn from_bytes(r: u8, g: u8, b: u8, a: u8) -> Self {
        let unit = |v: u8| f64::from(v) / 255.0;
        Self::rgba(unit(r), unit(g), unit(b), unit(a))
    }
}

impl From<ColorDef> for Rgba8Premul {
    fn from(value: ColorDef) -> Self {
        value.to_rgba8_premul()
    }
}

impl FromStr for ColorDef {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "transparent" => return Ok(Self::rgba(0.0, 0.0, 0.0, 0.0)),
            "black" => return Ok(Self::rgba(0.0, 0.0, 0.0, 1.0)),
            "white" => return Ok(Self::rgba(1.0, 1.0, 1.0, 1.0)),
            _ => {}
        }

        let syntax = || ColorParseError::Syntax(s.to_owned());
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if !digits.is_ascii() {
            return Err(syntax());
        }
        let nibble = |i: usize| u8::from_str_radix(&digits[i..=i], 16).map_err(|_| syntax());
        let byte = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| syntax());

        match digits.len() {
            3 => {
                let (r, g, b) = (nibble(0)?, nibble(1)?, nibble(2)?);
                Ok(Self::from_bytes(r * 17, g * 17, b * 17, 255))
            }
            6 => Ok(Self::from_bytes(byte(0)?, byte(2)?, byte(4)?, 255)),
            8 => Ok(Self::from_bytes(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => Err(syntax()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColorRepr {
    Text(String),
    Rgb {
        r: f64,
        g: f64,
        b: f64,
        #[serde(default = "opaque")]
        a: f64,
    },
    Hsl {
        h: f64,
        s: f64,
        l: f64,
        #[serde(default = "opaque")]
        a: f64,
    },
    Channels(Vec<f64>),
}

fn opaque() -> f64 {
    1.0
}

impl TryFrom<ColorRepr> for ColorDef {
    type Error = ColorParseError;

    fn try_from(repr: ColorRepr) -> Result<Self, Self::Error> {
        match repr {
            ColorRepr::Text(s) => s.parse(),
            ColorRepr::Rgb { r, g, b, a } => Ok(Self::rgba(r, g, b, a)),
            ColorRepr::Hsl { h, s, l, a } => Ok(Self::hsla(h, s, l, a)),
            ColorRepr::Channels(c) => match c[..] {
                [r, g, b] => Ok(Self::rgba(r, g, b, 1.0)),
                [r, g, b, a] => Ok(Self::rgba(r, g, b, a)),
                _ => Err(ColorParseError::Channels(c.len())),
            },
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/color.rs"]
mod tests;
