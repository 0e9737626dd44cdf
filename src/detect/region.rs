//! Geometry of detected text regions.
//!
//! All coordinates are in the detector's native space: pixels of the image
//! that was handed to the detection backend. Conversion into display space
//! happens in the highlight module.

// ---------------------------------------------------------------------------
// Point
// ---------------------------------------------------------------------------

/// A 2-D point in detector coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

// ---------------------------------------------------------------------------
// Quad
// ---------------------------------------------------------------------------

/// A detected text region: four ordered corner points.
///
/// Detection backends report corners clockwise starting at the top-left,
/// but nothing in this crate depends on the winding — only on the four
/// points as a set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad([Point; 4]);

impl Quad {
    pub fn new(points: [Point; 4]) -> Self {
        Self(points)
    }

    /// Axis-aligned quad from a top-left corner and a size. Convenient for
    /// backends (and tests) that report plain bounding boxes.
    pub fn from_rect(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self([
            Point::new(x, y),
            Point::new(x + w, y),
            Point::new(x + w, y + h),
            Point::new(x, y + h),
        ])
    }

    pub fn points(&self) -> &[Point; 4] {
        &self.0
    }

    /// Arithmetic mean of the four corners.
    pub fn centroid(&self) -> Point {
        let sx: f32 = self.0.iter().map(|p| p.x).sum();
        let sy: f32 = self.0.iter().map(|p| p.y).sum();
        Point::new(sx / 4.0, sy / 4.0)
    }

    /// Uniformly scale all four corners about the origin.
    pub fn scaled(&self, factor: f32) -> Quad {
        Quad(self.0.map(|p| Point::new(p.x * factor, p.y * factor)))
    }

    /// Axis-aligned bounding box as `(min, max)` corners.
    pub fn bounds(&self) -> (Point, Point) {
        let mut min = self.0[0];
        let mut max = self.0[0];
        for p in &self.0[1..] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        (min, max)
    }
}

// ---------------------------------------------------------------------------
// DetectedLine
// ---------------------------------------------------------------------------

/// One raw line of text as reported by the detection backend.
#[derive(Debug, Clone)]
pub struct DetectedLine {
    /// Region containing the text, in detector coordinates.
    pub quad: Quad,
    /// Recognised text content.
    pub text: String,
    /// Backend confidence in `[0.0, 1.0]`.
    pub confidence: f32,
}

impl DetectedLine {
    pub fn new(quad: Quad, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            quad,
            text: text.into(),
            confidence,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
