//! Eye aspect ratio (EAR).
//!
//! For a six-point eye contour `p0..p5` (corners at `p0` and `p3`, upper lid
//! `p1 p2`, lower lid `p4 p5`):
//!
//! ```text
//! EAR = (|p1 - p5| + |p2 - p4|) / (2 * |p0 - p3|)
//! ```
//!
//! The ratio stays roughly constant while the eye is open and drops towards
//! zero when it closes.

use crate::geometry::{Landmarks, Point, LEFT_EYE, RIGHT_EYE};

/// EAR of one eye, or `None` if the contour is unusable.
pub fn eye_aspect_ratio(eye: &[Point]) -> Option<f32> {
    if eye.len() < 6 {
        return None;
    }
    let vertical_a = eye[1].distance(&eye[5]);
    let vertical_b = eye[2].distance(&eye[4]);
    let horizontal = eye[0].distance(&eye[3]);
    if horizontal <= f32::EPSILON {
        return None;
    }
    Some((vertical_a + vertical_b) / (2.0 * horizontal))
}

/// Mean EAR of both eyes. `None` unless both eyes are present and usable.
pub fn face_ear(landmarks: &Landmarks) -> Option<f32> {
    let left = eye_aspect_ratio(landmarks.region(LEFT_EYE)?)?;
    let right = eye_aspect_ratio(landmarks.region(RIGHT_EYE)?)?;
    Some((left + right) / 2.0)
}
