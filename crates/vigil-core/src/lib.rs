//! Vigil core: per-frame face recognition and blink liveness.
//!
//! Face detection and encoding are delegated to a [`VisionModel`]. This crate
//! owns everything between: rescaling detections back to full resolution,
//! nearest-neighbour identity matching, eye aspect ratio, and the per-session
//! blink state machine.

pub mod config;
pub mod ear;
pub mod embedding;
pub mod enroll;
pub mod frame;
pub mod gallery;
pub mod geometry;
pub mod liveness;
pub mod matcher;
pub mod pipeline;
pub mod vision;

#[cfg(test)]
mod test_support;

pub use config::{ConfigError, PipelineConfig};
pub use embedding::Embedding;
pub use enroll::EnrollError;
pub use frame::FrameError;
pub use gallery::{Gallery, GalleryEntry, GalleryError};
pub use geometry::{FaceBox, FrameScale, Landmarks, Point};
pub use liveness::{LivenessConfig, LivenessState, LivenessStatus, LivenessTracker};
pub use matcher::{EuclideanMatcher, Identity, MatchResult, Matcher, UNKNOWN_LABEL};
pub use pipeline::{FaceResult, FramePipeline, FrameResult, Session};
pub use vision::{DetectionMethod, VisionError, VisionModel};
