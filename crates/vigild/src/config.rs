use std::path::PathBuf;
use std::time::Duration;
use vigil_core::config::blink_validity_from_secs;
use vigil_core::{ConfigError, DetectionMethod, LivenessConfig, PipelineConfig};

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP/WebSocket listener binds to.
    pub bind_addr: String,
    /// Path to the SQLite enrollment database.
    pub db_path: PathBuf,
    /// Optional `<person>/<photo>` directory merged into the gallery at startup.
    pub known_faces_dir: Option<PathBuf>,
    /// Base URL of the vision sidecar.
    pub vision_url: String,
    pub vision_timeout_secs: u64,
    /// Downscale factor applied before detection.
    pub frame_scale: f64,
    /// Detector selector passed to the sidecar (`hog` or `cnn`).
    pub detection_method: String,
    /// Euclidean distance below which a face matches a gallery entry.
    pub recognition_threshold: f32,
    /// EAR below which eyes count as closed.
    pub ear_threshold: f32,
    /// Closed-eye frames required for a blink.
    pub consec_frames: u32,
    /// Seconds a blink keeps an identity live.
    pub blink_validity_secs: f64,
    /// Upper bound on the reservation lookup per result.
    pub enrichment_timeout_ms: u64,
}

impl Config {
    /// Load configuration from `VIGIL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("vigil");

        let db_path = std::env::var("VIGIL_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("faces.db"));

        Self {
            bind_addr: std::env::var("VIGIL_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            db_path,
            known_faces_dir: std::env::var("VIGIL_KNOWN_FACES_DIR").ok().map(PathBuf::from),
            vision_url: std::env::var("VIGIL_VISION_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8500".to_string()),
            vision_timeout_secs: env_u64("VIGIL_VISION_TIMEOUT_SECS", 10),
            frame_scale: env_f64("VIGIL_FRAME_SCALE", 0.25),
            detection_method: std::env::var("VIGIL_DETECTION_METHOD")
                .unwrap_or_else(|_| "hog".to_string()),
            recognition_threshold: env_f32("VIGIL_RECOGNITION_THRESHOLD", 0.6),
            ear_threshold: env_f32("VIGIL_EAR_THRESHOLD", 0.3),
            consec_frames: env_u32("VIGIL_CONSEC_FRAMES", 2),
            blink_validity_secs: env_f64("VIGIL_BLINK_VALIDITY_SECS", 8.0),
            enrichment_timeout_ms: env_u64("VIGIL_ENRICHMENT_TIMEOUT_MS", 500),
        }
    }

    /// The validated pipeline configuration. Any out-of-range value is fatal.
    pub fn pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        let config = PipelineConfig {
            frame_scale: self.frame_scale,
            detection_method: DetectionMethod::new(self.detection_method.clone()),
            recognition_threshold: self.recognition_threshold,
            liveness: LivenessConfig {
                ear_threshold: self.ear_threshold,
                consec_frames: self.consec_frames,
                blink_validity: blink_validity_from_secs(self.blink_validity_secs)?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn vision_timeout(&self) -> Duration {
        Duration::from_secs(self.vision_timeout_secs)
    }

    pub fn enrichment_timeout(&self) -> Duration {
        Duration::from_millis(self.enrichment_timeout_ms)
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            bind_addr: "127.0.0.1:0".into(),
            db_path: PathBuf::from(":memory:"),
            known_faces_dir: None,
            vision_url: "http://127.0.0.1:8500".into(),
            vision_timeout_secs: 10,
            frame_scale: 0.25,
            detection_method: "hog".into(),
            recognition_threshold: 0.6,
            ear_threshold: 0.3,
            consec_frames: 2,
            blink_validity_secs: 8.0,
            enrichment_timeout_ms: 500,
        }
    }

    #[test]
    fn test_pipeline_config_from_defaults() {
        let pipeline = config().pipeline_config().unwrap();
        assert_eq!(pipeline.frame_scale, 0.25);
        assert_eq!(pipeline.detection_method.as_str(), "hog");
        assert_eq!(pipeline.liveness.consec_frames, 2);
        assert_eq!(pipeline.liveness.blink_validity, Duration::from_secs(8));
    }

    #[test]
    fn test_out_of_range_values_are_fatal() {
        let mut c = config();
        c.frame_scale = 0.0;
        assert!(matches!(c.pipeline_config(), Err(ConfigError::FrameScale(_))));

        let mut c = config();
        c.blink_validity_secs = -1.0;
        assert!(matches!(c.pipeline_config(), Err(ConfigError::BlinkValidity(_))));

        let mut c = config();
        c.consec_frames = 0;
        assert!(matches!(c.pipeline_config(), Err(ConfigError::ConsecFrames)));
    }

    #[test]
    fn test_env_helpers_fall_back_on_garbage() {
        // unique keys so parallel tests never collide
        std::env::set_var("VIGIL_TEST_CONFIG_GARBAGE", "not-a-number");
        assert_eq!(env_f32("VIGIL_TEST_CONFIG_GARBAGE", 0.6), 0.6);
        assert_eq!(env_u32("VIGIL_TEST_CONFIG_GARBAGE", 2), 2);
        std::env::set_var("VIGIL_TEST_CONFIG_NUMBER", "0.35");
        assert_eq!(env_f64("VIGIL_TEST_CONFIG_NUMBER", 0.25), 0.35);
        assert_eq!(env_u64("VIGIL_TEST_CONFIG_UNSET", 500), 500);
    }
}
