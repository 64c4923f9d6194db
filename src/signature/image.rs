// Rasterized signature ink: fixed canvas, opaque background, single ink colour

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::pad::{Point, Stroke};

/// Half-width of the square pen tip, in pixels
const PEN_RADIUS: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid colour {0:?}, expected #RRGGBB")]
pub struct RgbParseError(pub String);

impl Rgb {
    pub const WHITE: Rgb = Rgb {
        r: 0xff,
        g: 0xff,
        b: 0xff,
    };
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = RgbParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RgbParseError(s.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| RgbParseError(s.to_string()))
        };
        Ok(Rgb {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// 1 bit per pixel, row-major, least significant bit first. A set bit is ink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureImage {
    pub width: u32,
    pub height: u32,
    pub background: Rgb,
    pub ink: Rgb,
    #[serde(with = "packed_bits")]
    bitmap: Vec<u8>,
}

impl SignatureImage {
    pub fn blank(width: u32, height: u32, ink: Rgb) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            width,
            height,
            background: Rgb::WHITE,
            ink,
            bitmap: vec![0; pixels.div_ceil(8)],
        }
    }

    pub fn rasterize(width: u32, height: u32, ink: Rgb, strokes: &[Stroke]) -> Self {
        let mut image = Self::blank(width, height, ink);
        for stroke in strokes {
            match stroke.points() {
                [] => {}
                [single] => image.stamp(*single),
                points => {
                    for pair in points.windows(2) {
                        image.draw_line(pair[0], pair[1]);
                    }
                }
            }
        }
        image
    }

    pub fn pixel(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let index = y as usize * self.width as usize + x as usize;
        self.bitmap
            .get(index / 8)
            .is_some_and(|byte| byte & (1 << (index % 8)) != 0)
    }

    pub fn ink_pixels(&self) -> usize {
        self.bitmap.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn packed_bits(&self) -> &[u8] {
        &self.bitmap
    }

    /// SHA-256 over the dimensions and bitmap, hex encoded
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.width.to_be_bytes());
        hasher.update(self.height.to_be_bytes());
        hasher.update(&self.bitmap);
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    // Bresenham, stamping the pen at every step
    fn draw_line(&mut self, from: Point, to: Point) {
        let (mut x0, mut y0) = (i64::from(from.x), i64::from(from.y));
        let (x1, y1) = (i64::from(to.x), i64::from(to.y));
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.stamp_at(x0, y0);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    fn stamp(&mut self, point: Point) {
        self.stamp_at(i64::from(point.x), i64::from(point.y));
    }

    fn stamp_at(&mut self, cx: i64, cy: i64) {
        for y in (cy - PEN_RADIUS)..=(cy + PEN_RADIUS) {
            for x in (cx - PEN_RADIUS)..=(cx + PEN_RADIUS) {
                self.set(x, y);
            }
        }
    }

    fn set(&mut self, x: i64, y: i64) {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        let index = (y * i64::from(self.width) + x) as usize;
        if let Some(byte) = self.bitmap.get_mut(index / 8) {
            *byte |= 1 << (index % 8);
        }
    }
}

mod packed_bits {
    use super::*;

    pub fn serialize<S: Serializer>(bits: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bits))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
