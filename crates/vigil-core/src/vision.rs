use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::embedding::Embedding;
use crate::geometry::{FaceBox, Landmarks};

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("vision model unavailable: {0}")]
    Unavailable(String),
    #[error("invalid response from vision model: {0}")]
    InvalidResponse(String),
    #[error("vision model returned {got} results for {expected} faces")]
    CountMismatch { expected: usize, got: usize },
}

/// Detector selector passed through to the vision model untouched
/// (for example `hog` or `cnn`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetectionMethod(String);

impl DetectionMethod {
    pub fn new(method: impl Into<String>) -> Self {
        Self(method.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Face detection, landmarking and encoding.
///
/// All coordinates are in the pixel space of the image passed to the call.
/// `landmarks` and `encode` return one item per input box, in box order.
/// Implementations are expected to be deterministic for a fixed model.
pub trait VisionModel: Send + Sync {
    fn detect(&self, image: &RgbImage, method: &DetectionMethod)
        -> Result<Vec<FaceBox>, VisionError>;

    fn landmarks(&self, image: &RgbImage, boxes: &[FaceBox]) -> Result<Vec<Landmarks>, VisionError>;

    fn encode(&self, image: &RgbImage, boxes: &[FaceBox]) -> Result<Vec<Embedding>, VisionError>;
}
