//! Face boxes, landmarks, and the mapping from the downscaled detection frame
//! back to full-resolution coordinates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::ConfigError;

/// Landmark region holding the six-point contour of the subject's left eye.
pub const LEFT_EYE: &str = "left_eye";
/// Landmark region holding the six-point contour of the subject's right eye.
pub const RIGHT_EYE: &str = "right_eye";

/// Integer pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Face bounding box in `(top, right, bottom, left)` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl FaceBox {
    pub fn new(top: i32, right: i32, bottom: i32, left: i32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// `[left, top, right, bottom]`, the order clients draw rectangles in.
    pub fn to_ltrb(&self) -> [i32; 4] {
        [self.left, self.top, self.right, self.bottom]
    }

    /// `[top, right, bottom, left]`.
    pub fn to_trbl(&self) -> [i32; 4] {
        [self.top, self.right, self.bottom, self.left]
    }

    pub fn from_trbl([top, right, bottom, left]: [i32; 4]) -> Self {
        Self::new(top, right, bottom, left)
    }
}

/// Facial landmarks for one face: region name → ordered contour points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Landmarks {
    regions: BTreeMap<String, Vec<Point>>,
}

impl Landmarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, region: impl Into<String>, points: Vec<Point>) {
        self.regions.insert(region.into(), points);
    }

    pub fn region(&self, name: &str) -> Option<&[Point]> {
        self.regions.get(name).map(Vec::as_slice)
    }

    pub fn regions(&self) -> impl Iterator<Item = (&str, &[Point])> {
        self.regions.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl FromIterator<(String, Vec<Point>)> for Landmarks {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Point>)>>(iter: I) -> Self {
        Self {
            regions: iter.into_iter().collect(),
        }
    }
}

/// Downscale factor applied to frames before detection, in `(0, 1]`.
///
/// Construction is the only place the factor is checked; a `FrameScale` in
/// hand is always usable as a divisor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameScale(f64);

impl FrameScale {
    pub fn new(factor: f64) -> Result<Self, ConfigError> {
        if !factor.is_finite() || factor <= 0.0 || factor > 1.0 {
            return Err(ConfigError::FrameScale(factor));
        }
        Ok(Self(factor))
    }

    pub fn factor(&self) -> f64 {
        self.0
    }

    /// Map one coordinate from the scaled frame to the full frame.
    /// Truncates toward zero, never rounds.
    pub fn rescale(&self, v: i32) -> i32 {
        (f64::from(v) / self.0) as i32
    }

    pub fn rescale_point(&self, p: Point) -> Point {
        Point::new(self.rescale(p.x), self.rescale(p.y))
    }

    pub fn rescale_box(&self, b: FaceBox) -> FaceBox {
        FaceBox::new(
            self.rescale(b.top),
            self.rescale(b.right),
            self.rescale(b.bottom),
            self.rescale(b.left),
        )
    }

    pub fn rescale_landmarks(&self, landmarks: &Landmarks) -> Landmarks {
        landmarks
            .regions()
            .map(|(name, pts)| {
                (
                    name.to_string(),
                    pts.iter().map(|&p| self.rescale_point(p)).collect(),
                )
            })
            .collect()
    }

    /// Size of the detection frame for a `width`×`height` input.
    pub fn scaled_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let scale = |v: u32| ((f64::from(v) * self.0).round() as u32).max(1);
        (scale(width), scale(height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rescale_box_quarter_scale() {
        let scale = FrameScale::new(0.25).unwrap();
        let rescaled = scale.rescale_box(FaceBox::new(40, 80, 120, 20));
        assert_eq!(rescaled, FaceBox::new(160, 320, 480, 80));
    }

    #[test]
    fn test_rescale_truncates_not_rounds() {
        // 10 / 0.3 = 33.33.., 11 / 0.3 = 36.66..
        let scale = FrameScale::new(0.3).unwrap();
        assert_eq!(scale.rescale(10), 33);
        assert_eq!(scale.rescale(11), 36);
    }

    #[test]
    fn test_rescale_negative_truncates_toward_zero() {
        let scale = FrameScale::new(0.3).unwrap();
        assert_eq!(scale.rescale(-11), -36);
    }

    #[test]
    fn test_unit_scale_is_identity() {
        let scale = FrameScale::new(1.0).unwrap();
        let b = FaceBox::new(7, 99, 130, 3);
        assert_eq!(scale.rescale_box(b), b);
    }

    #[test]
    fn test_rescale_landmarks() {
        let scale = FrameScale::new(0.5).unwrap();
        let mut lm = Landmarks::new();
        lm.insert(LEFT_EYE, vec![Point::new(10, 11), Point::new(12, 13)]);
        lm.insert("nose_tip", vec![Point::new(3, 5)]);

        let full = scale.rescale_landmarks(&lm);
        assert_eq!(
            full.region(LEFT_EYE).unwrap(),
            &[Point::new(20, 22), Point::new(24, 26)]
        );
        assert_eq!(full.region("nose_tip").unwrap(), &[Point::new(6, 10)]);
        assert!(full.region(RIGHT_EYE).is_none());
    }

    #[test]
    fn test_invalid_scale_rejected() {
        assert!(matches!(
            FrameScale::new(0.0),
            Err(ConfigError::FrameScale(_))
        ));
        assert!(FrameScale::new(-0.25).is_err());
        assert!(FrameScale::new(1.5).is_err());
        assert!(FrameScale::new(f64::NAN).is_err());
    }

    #[test]
    fn test_scaled_dimensions() {
        let scale = FrameScale::new(0.25).unwrap();
        assert_eq!(scale.scaled_dimensions(1280, 720), (320, 180));
        assert_eq!(scale.scaled_dimensions(2, 2), (1, 1));
        assert_eq!(scale.scaled_dimensions(1, 1), (1, 1));
    }

    #[test]
    fn test_box_orderings() {
        let b = FaceBox::new(1, 2, 3, 4);
        assert_eq!(b.to_ltrb(), [4, 1, 2, 3]);
        assert_eq!(FaceBox::from_trbl(b.to_trbl()), b);
    }
}
