use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use super::image::{Rgb, SignatureImage};
use super::{CaptureError, Signature, SignerRole};

pub const DEFAULT_CANVAS_WIDTH: u32 = 700;
pub const DEFAULT_CANVAS_HEIGHT: u32 = 150;
/// Largest canvas side the pad will allocate, in pixels
pub const MAX_CANVAS_DIMENSION: u32 = 4096;

/// Logical pixel position on the signature canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid stroke {input:?}: {reason}")]
pub struct StrokeParseError {
    pub input: String,
    pub reason: String,
}

/// Parses `x,y`. Fractional and negative coordinates are accepted and rounded
/// or clamped onto the canvas grid.
impl FromStr for Point {
    type Err = StrokeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |reason: &str| StrokeParseError {
            input: s.to_string(),
            reason: reason.to_string(),
        };
        let (x, y) = s.split_once(',').ok_or_else(|| fail("expected x,y"))?;
        let coord = |raw: &str| -> Result<u32, StrokeParseError> {
            let value: f64 = raw.trim().parse().map_err(|_| fail("coordinate is not a number"))?;
            if !value.is_finite() {
                return Err(fail("coordinate is not finite"));
            }
            Ok(value.round().clamp(0.0, f64::from(u32::MAX)) as u32)
        };
        Ok(Point::new(coord(x)?, coord(y)?))
    }
}

/// One continuous pen-down path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stroke {
    points: Vec<Point>,
}

impl Stroke {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn clamped(mut self, width: u32, height: u32) -> Self {
        for point in &mut self.points {
            *point = clamp(*point, width, height);
        }
        self
    }
}

/// Parses whitespace separated points: `10,12 14,18 22,20`
impl FromStr for Stroke {
    type Err = StrokeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let points = s
            .split_whitespace()
            .map(Point::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        if points.is_empty() {
            return Err(StrokeParseError {
                input: s.to_string(),
                reason: "stroke has no points".to_string(),
            });
        }
        Ok(Stroke::new(points))
    }
}

fn clamp(point: Point, width: u32, height: u32) -> Point {
    Point {
        x: point.x.min(width.saturating_sub(1)),
        y: point.y.min(height.saturating_sub(1)),
    }
}

/// Drawing surface plus signer name field.
///
/// The pad accumulates strokes the way a canvas does between pointer-down and
/// pointer-up events. `clear` wipes the ink but keeps the typed name so a
/// signer can redraw without retyping.
#[derive(Debug, Clone)]
pub struct SignaturePad {
    width: u32,
    height: u32,
    ink: Rgb,
    signer_name: String,
    strokes: Vec<Stroke>,
    current: Option<Stroke>,
}

impl Default for SignaturePad {
    fn default() -> Self {
        Self::new(DEFAULT_CANVAS_WIDTH, DEFAULT_CANVAS_HEIGHT)
    }
}

impl SignaturePad {
    /// Sides are clamped to `1..=MAX_CANVAS_DIMENSION`
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.clamp(1, MAX_CANVAS_DIMENSION),
            height: height.clamp(1, MAX_CANVAS_DIMENSION),
            ink: Rgb::BLACK,
            signer_name: String::new(),
            strokes: Vec::new(),
            current: None,
        }
    }

    pub fn from_config(config: &crate::config::SignatureConfig) -> Result<Self, super::RgbParseError> {
        Ok(Self::new(config.canvas_width, config.canvas_height).with_ink(config.ink_color.parse()?))
    }

    pub fn with_ink(mut self, ink: Rgb) -> Self {
        self.ink = ink;
        self
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.signer_name = name.into();
    }

    pub fn signer_name(&self) -> &str {
        &self.signer_name
    }

    /// Pointer down
    pub fn begin_stroke(&mut self, at: Point) {
        self.end_stroke();
        self.current = Some(Stroke::new(vec![clamp(at, self.width, self.height)]));
    }

    /// Pointer move; starts a stroke if none is in progress
    pub fn extend_stroke(&mut self, to: Point) {
        let to = clamp(to, self.width, self.height);
        match self.current.as_mut() {
            Some(stroke) => stroke.points.push(to),
            None => self.current = Some(Stroke::new(vec![to])),
        }
    }

    /// Pointer up
    pub fn end_stroke(&mut self) {
        if let Some(stroke) = self.current.take() {
            if !stroke.is_empty() {
                self.strokes.push(stroke);
            }
        }
    }

    pub fn add_stroke(&mut self, stroke: Stroke) {
        self.end_stroke();
        if !stroke.is_empty() {
            self.strokes.push(stroke.clamped(self.width, self.height));
        }
    }

    /// Reset the drawing surface; the signer name is left alone
    pub fn clear(&mut self) {
        self.strokes.clear();
        self.current = None;
    }

    pub fn stroke_count(&self) -> usize {
        self.strokes.len() + usize::from(self.current.as_ref().is_some_and(|s| !s.is_empty()))
    }

    pub fn is_empty(&self) -> bool {
        self.stroke_count() == 0
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.signer_name.trim().is_empty() {
            return Err(CaptureError::MissingName);
        }
        if self.is_empty() {
            return Err(CaptureError::EmptySignature);
        }
        Ok(())
    }

    pub fn submit(&self, role: SignerRole) -> Result<Signature, CaptureError> {
        self.submit_at(role, Utc::now())
    }

    pub fn submit_at(&self, role: SignerRole, at: DateTime<Utc>) -> Result<Signature, CaptureError> {
        self.validate()?;

        let mut strokes = self.strokes.clone();
        if let Some(current) = self.current.as_ref().filter(|s| !s.is_empty()) {
            strokes.push(current.clone());
        }
        let image = SignatureImage::rasterize(self.width, self.height, self.ink, &strokes);

        tracing::debug!(
            role = %role,
            strokes = strokes.len(),
            ink_pixels = image.ink_pixels(),
            "Signature captured"
        );

        Ok(Signature {
            signer_name: self.signer_name.trim().to_string(),
            role,
            image,
            captured_at: at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scribble(pad: &mut SignaturePad) {
        pad.begin_stroke(Point::new(10, 100));
        pad.extend_stroke(Point::new(40, 60));
        pad.extend_stroke(Point::new(80, 110));
        pad.end_stroke();
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let mut pad = SignaturePad::default();
        scribble(&mut pad);
        assert_eq!(pad.submit(SignerRole::Carrier).unwrap_err(), CaptureError::MissingName);

        pad.set_name("   ");
        assert_eq!(pad.submit(SignerRole::Carrier).unwrap_err(), CaptureError::MissingName);
    }

    #[test]
    fn test_empty_signature_is_rejected() {
        let mut pad = SignaturePad::default();
        pad.set_name("J. Rivera");
        assert_eq!(
            pad.submit(SignerRole::Driver).unwrap_err(),
            CaptureError::EmptySignature
        );
    }

    #[test]
    fn test_clear_keeps_the_name() {
        let mut pad = SignaturePad::default();
        pad.set_name("Dana Ortiz");
        scribble(&mut pad);
        assert!(!pad.is_empty());

        pad.clear();
        assert!(pad.is_empty());
        assert_eq!(pad.signer_name(), "Dana Ortiz");
        assert_eq!(
            pad.submit(SignerRole::Shipper).unwrap_err(),
            CaptureError::EmptySignature
        );
    }

    #[test]
    fn test_submit_produces_normalized_signature() {
        let mut pad = SignaturePad::default();
        pad.set_name("  J. Rivera ");
        scribble(&mut pad);

        let signature = pad.submit(SignerRole::Driver).unwrap();
        assert_eq!(signature.signer_name, "J. Rivera");
        assert_eq!(signature.role, SignerRole::Driver);
        assert_eq!(signature.image.width, DEFAULT_CANVAS_WIDTH);
        assert_eq!(signature.image.height, DEFAULT_CANVAS_HEIGHT);
        assert_eq!(signature.image.background, Rgb::WHITE);
        assert!(signature.image.ink_pixels() > 0);
    }

    #[test]
    fn test_unfinished_stroke_counts_as_ink() {
        let mut pad = SignaturePad::new(100, 50);
        pad.set_name("Sam");
        pad.extend_stroke(Point::new(5, 5));
        assert_eq!(pad.stroke_count(), 1);
        assert!(pad.submit(SignerRole::Customer).is_ok());
    }

    #[test]
    fn test_points_are_clamped_to_canvas() {
        let mut pad = SignaturePad::new(100, 50);
        pad.set_name("Sam");
        pad.add_stroke(Stroke::new(vec![Point::new(500, 500)]));
        let signature = pad.submit(SignerRole::Customer).unwrap();
        assert!(signature.image.pixel(99, 49));
    }

    #[test]
    fn test_oversized_canvas_is_clamped() {
        let mut pad = SignaturePad::new(u32::MAX, u32::MAX);
        assert_eq!(pad.dimensions(), (MAX_CANVAS_DIMENSION, MAX_CANVAS_DIMENSION));
        assert_eq!(SignaturePad::new(0, 0).dimensions(), (1, 1));

        pad.set_name("Sam");
        pad.add_stroke(Stroke::new(vec![Point::new(u32::MAX, u32::MAX)]));
        let signature = pad.submit(SignerRole::Carrier).unwrap();
        assert_eq!(signature.image.width, MAX_CANVAS_DIMENSION);
        assert!(signature.image.pixel(MAX_CANVAS_DIMENSION - 1, MAX_CANVAS_DIMENSION - 1));
    }

    #[test]
    fn test_stroke_parsing() {
        let stroke: Stroke = "10,12 14.6,18 -3,20".parse().unwrap();
        assert_eq!(
            stroke.points(),
            &[Point::new(10, 12), Point::new(15, 18), Point::new(0, 20)]
        );
        assert!("".parse::<Stroke>().is_err());
        assert!("10;12".parse::<Stroke>().is_err());
        assert!("a,b".parse::<Stroke>().is_err());
    }
}
