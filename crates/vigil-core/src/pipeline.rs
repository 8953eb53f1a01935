//! One video frame in, one result per detected face out.
//!
//! [`FramePipeline`] holds everything that is shared between sessions: the
//! validated configuration, the read-only gallery and the vision model.
//! [`Session`] adds the state that is not shared: the blink tracker for one
//! stream. Frames of a session must be processed in arrival order.

use image::RgbImage;
use serde::{Serialize, Serializer};
use std::sync::Arc;
use std::time::Instant;

use crate::config::{ConfigError, PipelineConfig};
use crate::ear::face_ear;
use crate::frame::{decode_frame, downscale, FrameError};
use crate::gallery::Gallery;
use crate::geometry::{FaceBox, FrameScale, Landmarks};
use crate::liveness::{LivenessStatus, LivenessTracker};
use crate::matcher::{EuclideanMatcher, Identity, Matcher};
use crate::vision::{VisionError, VisionModel};

/// Result for one detected face.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceResult {
    #[serde(rename = "name")]
    pub identity: Identity,
    #[serde(rename = "email", skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    pub status: LivenessStatus,
    /// Full-resolution box, serialized as `[left, top, right, bottom]`.
    #[serde(serialize_with = "serialize_ltrb")]
    pub bbox: FaceBox,
    #[serde(skip)]
    pub ear: Option<f32>,
    #[serde(skip)]
    pub distance: Option<f32>,
}

fn serialize_ltrb<S: Serializer>(bbox: &FaceBox, serializer: S) -> Result<S::Ok, S::Error> {
    bbox.to_ltrb().serialize(serializer)
}

/// Results for one frame, in detection order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FrameResult {
    pub faces: Vec<FaceResult>,
}

impl FrameResult {
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FaceResult> {
        self.faces.iter()
    }
}

pub struct FramePipeline {
    config: PipelineConfig,
    scale: FrameScale,
    gallery: Arc<Gallery>,
    vision: Arc<dyn VisionModel>,
    matcher: Box<dyn Matcher>,
}

impl FramePipeline {
    /// Validate `config` and build the pipeline. Fails before any frame is seen.
    pub fn new(
        config: PipelineConfig,
        gallery: Arc<Gallery>,
        vision: Arc<dyn VisionModel>,
    ) -> Result<Self, ConfigError> {
        let scale = config.validate()?;
        Ok(Self {
            config,
            scale,
            gallery,
            vision,
            matcher: Box::new(EuclideanMatcher),
        })
    }

    pub fn with_matcher(mut self, matcher: impl Matcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    /// Start a new session with empty liveness state.
    pub fn session(self: &Arc<Self>) -> Session {
        Session {
            pipeline: Arc::clone(self),
            tracker: LivenessTracker::new(self.config.liveness),
            frames_processed: 0,
            frames_failed: 0,
        }
    }
}

/// Per-stream state. Dropping a session releases everything it owns and
/// leaves the shared pipeline untouched.
pub struct Session {
    pipeline: Arc<FramePipeline>,
    tracker: LivenessTracker,
    frames_processed: u64,
    frames_failed: u64,
}

impl Session {
    /// Decode and process one encoded frame. Any per-frame failure is logged
    /// and yields an empty result.
    pub fn process_bytes(&mut self, bytes: &[u8], now: Instant) -> FrameResult {
        let result = decode_frame(bytes).and_then(|frame| self.process_image(&frame, now));
        match result {
            Ok(result) => result,
            Err(e) => {
                self.frames_processed += 1;
                self.frames_failed += 1;
                tracing::warn!(
                    frame = self.frames_processed,
                    error = %e,
                    "frame skipped"
                );
                FrameResult::default()
            }
        }
    }

    /// Run detection, matching and liveness on a decoded frame.
    pub fn process_image(&mut self, frame: &RgbImage, now: Instant) -> Result<FrameResult, FrameError> {
        let pipeline = &self.pipeline;
        let config = &pipeline.config;
        let scale = pipeline.scale;

        let small = downscale(frame, scale);
        let small_boxes = pipeline.vision.detect(&small, &config.detection_method)?;
        if small_boxes.is_empty() {
            self.frames_processed += 1;
            return Ok(FrameResult::default());
        }

        let landmarks: Vec<Landmarks> = match pipeline.vision.landmarks(&small, &small_boxes) {
            Ok(sets) => sets.iter().map(|lm| scale.rescale_landmarks(lm)).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "landmarks unavailable, liveness not updated this frame");
                Vec::new()
            }
        };

        let boxes: Vec<FaceBox> = small_boxes.iter().map(|&b| scale.rescale_box(b)).collect();
        let embeddings = pipeline.vision.encode(frame, &boxes)?;
        if embeddings.len() != boxes.len() {
            return Err(VisionError::CountMismatch {
                expected: boxes.len(),
                got: embeddings.len(),
            }
            .into());
        }

        let mut faces = Vec::with_capacity(boxes.len());
        for (i, (bbox, embedding)) in boxes.into_iter().zip(embeddings).enumerate() {
            let matched = pipeline.matcher.identify(
                &embedding,
                &pipeline.gallery,
                config.recognition_threshold,
            );
            let ear = landmarks.get(i).and_then(face_ear);
            let status = self.tracker.observe(&matched.identity, ear, now);

            tracing::debug!(
                face = i,
                identity = matched.identity.as_str(),
                distance = ?matched.distance,
                ear = ?ear,
                status = status.as_str(),
                "face processed"
            );

            faces.push(FaceResult {
                identity: matched.identity,
                contact: matched.contact,
                status,
                bbox,
                ear,
                distance: matched.distance,
            });
        }

        self.frames_processed += 1;
        Ok(FrameResult { faces })
    }

    pub fn tracker(&self) -> &LivenessTracker {
        &self.tracker
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn frames_failed(&self) -> u64 {
        self.frames_failed
    }
}
