use std::time::Duration;
use thiserror::Error;

use crate::geometry::FrameScale;
use crate::liveness::LivenessConfig;
use crate::vision::DetectionMethod;

/// Invalid pipeline configuration. Fatal at session start.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("frame scale must be in (0, 1], got {0}")]
    FrameScale(f64),
    #[error("recognition threshold must be positive, got {0}")]
    RecognitionThreshold(f32),
    #[error("EAR threshold must be positive, got {0}")]
    EarThreshold(f32),
    #[error("consecutive closed frames must be at least 1")]
    ConsecFrames,
    #[error("blink validity time must be a finite, non-negative number of seconds, got {0}")]
    BlinkValidity(f64),
    #[error("detection method must not be empty")]
    DetectionMethod,
}

/// Everything a [`crate::FramePipeline`] needs besides the gallery and the
/// vision model.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub frame_scale: f64,
    pub detection_method: DetectionMethod,
    pub recognition_threshold: f32,
    pub liveness: LivenessConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_scale: 0.25,
            detection_method: DetectionMethod::new("hog"),
            recognition_threshold: 0.6,
            liveness: LivenessConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Check every value against its allowed range.
    pub fn validate(&self) -> Result<FrameScale, ConfigError> {
        let scale = FrameScale::new(self.frame_scale)?;
        if self.detection_method.as_str().is_empty() {
            return Err(ConfigError::DetectionMethod);
        }
        if self.recognition_threshold.is_nan() || self.recognition_threshold <= 0.0 {
            return Err(ConfigError::RecognitionThreshold(self.recognition_threshold));
        }
        if self.liveness.ear_threshold.is_nan() || self.liveness.ear_threshold <= 0.0 {
            return Err(ConfigError::EarThreshold(self.liveness.ear_threshold));
        }
        if self.liveness.consec_frames == 0 {
            return Err(ConfigError::ConsecFrames);
        }
        Ok(scale)
    }
}

/// Convert a seconds value from configuration into a [`Duration`].
pub fn blink_validity_from_secs(secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::BlinkValidity(secs))
}
