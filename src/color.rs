//! Color values, border specs and the RGB/CMYK ink model

use image::Rgba;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Straight (non-premultiplied) 8-bit RGBA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color { r: 0, g: 0, b: 0, a: 0 };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Result<Self, ColorParseError> {
        let digits = hex.trim().trim_start_matches('#');
        if !(digits.len() == 6 || digits.len() == 8) || !digits.is_ascii() {
            return Err(ColorParseError(hex.to_string()));
        }
        let byte = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| ColorParseError(hex.to_string()))
        };
        let a = if digits.len() == 8 { byte(6)? } else { 255 };
        Ok(Self { r: byte(0)?, g: byte(2)?, b: byte(4)?, a })
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }

    pub fn to_rgba(&self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, self.a])
    }

    pub fn scaled(&self, factor: f32) -> Self {
        let s = |c: u8| (c as f32 * factor).round().clamp(0.0, 255.0) as u8;
        Self { r: s(self.r), g: s(self.g), b: s(self.b), a: self.a }
    }

    pub fn with_alpha(&self, a: u8) -> Self {
        Self { a, ..*self }
    }

    /// Euclidean distance in RGB space, alpha ignored.
    pub fn distance(&self, r: u8, g: u8, b: u8) -> f64 {
        let dr = self.r as f64 - r as f64;
        let dg = self.g as f64 - g as f64;
        let db = self.b as f64 - b as f64;
        (dr * dr + dg * dg + db * db).sqrt()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorParseError(pub String);

impl fmt::Display for ColorParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid color '{}', expected #RRGGBB or #RRGGBBAA", self.0)
    }
}

impl std::error::Error for ColorParseError {}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::from_hex(s)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// `"<width>px solid <hexcolor>"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorderSpec {
    pub width: u32,
    pub color: Color,
}

impl FromStr for BorderSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        let [width, style, color] = parts.as_slice() else {
            return Err(format!("border '{s}' must look like '4px solid #FF6600'"));
        };
        let width = width
            .strip_suffix("px")
            .and_then(|w| w.parse::<u32>().ok())
            .ok_or_else(|| format!("border width '{width}' must be an integer followed by px"))?;
        if !style.eq_ignore_ascii_case("solid") {
            return Err(format!("border style '{style}' is not supported, only solid"));
        }
        let color = Color::from_hex(color).map_err(|e| e.to_string())?;
        Ok(Self { width, color })
    }
}

/// Ink coverage per plate, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cmyk {
    pub c: f32,
    pub m: f32,
    pub y: f32,
    pub k: f32,
}

impl Cmyk {
    pub const PAPER: Cmyk = Cmyk { c: 0.0, m: 0.0, y: 0.0, k: 0.0 };

    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let (r, g, b) = (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
        let k = 1.0 - r.max(g).max(b);
        if k >= 1.0 {
            return Cmyk { c: 0.0, m: 0.0, y: 0.0, k: 1.0 };
        }
        let white = 1.0 - k;
        Cmyk {
            c: (1.0 - r - k) / white,
            m: (1.0 - g - k) / white,
            y: (1.0 - b - k) / white,
            k,
        }
    }

    pub fn to_rgb(&self) -> [u8; 3] {
        let channel = |ink: f32| ((1.0 - ink) * (1.0 - self.k) * 255.0).round().clamp(0.0, 255.0) as u8;
        [channel(self.c), channel(self.m), channel(self.y)]
    }
}
