//! `vigil replay`: run one session over a directory of frames.
//!
//! Frames are read in file name order and stamped `1/fps` seconds apart, so a
//! recorded stream reproduces the same liveness decisions as it did live.

use anyhow::{bail, Context, Result};
use clap::Args;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use vigil_core::config::blink_validity_from_secs;
use vigil_core::{FramePipeline, LivenessConfig, PipelineConfig, Session};
use vigil_store::FaceStore;

use crate::VisionArgs;

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

#[derive(Args)]
pub struct ReplayArgs {
    /// Directory of frame images
    dir: PathBuf,

    /// Frame rate used to space timestamps
    #[arg(long, default_value_t = 10.0)]
    fps: f64,

    #[arg(long, env = "VIGIL_FRAME_SCALE", default_value_t = 0.25)]
    frame_scale: f64,

    #[arg(long, env = "VIGIL_RECOGNITION_THRESHOLD", default_value_t = 0.6)]
    recognition_threshold: f32,

    #[arg(long, env = "VIGIL_EAR_THRESHOLD", default_value_t = 0.3)]
    ear_threshold: f32,

    #[arg(long, env = "VIGIL_CONSEC_FRAMES", default_value_t = 2)]
    consec_frames: u32,

    #[arg(long, env = "VIGIL_BLINK_VALIDITY_SECS", default_value_t = 8.0)]
    blink_validity_secs: f64,

    #[command(flatten)]
    vision: VisionArgs,
}

impl ReplayArgs {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        Ok(PipelineConfig {
            frame_scale: self.frame_scale,
            detection_method: self.vision.method(),
            recognition_threshold: self.recognition_threshold,
            liveness: LivenessConfig {
                ear_threshold: self.ear_threshold,
                consec_frames: self.consec_frames,
                blink_validity: blink_validity_from_secs(self.blink_validity_secs)?,
            },
        })
    }
}

pub async fn run(store: &FaceStore, args: ReplayArgs) -> Result<()> {
    let interval = frame_interval(args.fps)?;
    let frames = frame_paths(&args.dir)?;
    if frames.is_empty() {
        bail!("no frames found in {}", args.dir.display());
    }

    let gallery = store.load_gallery().await.context("failed to load gallery")?;
    let pipeline = FramePipeline::new(args.pipeline_config()?, Arc::new(gallery), args.vision.vision())
        .context("invalid configuration")?;
    let session = Arc::new(pipeline).session();

    tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        replay(session, &frames, interval, Instant::now(), &mut stdout.lock())
    })
    .await
    .context("replay task failed")?
}

fn frame_interval(fps: f64) -> Result<Duration> {
    if !fps.is_finite() || fps <= 0.0 {
        bail!("--fps must be a positive number, got {fps}");
    }
    Duration::try_from_secs_f64(1.0 / fps).with_context(|| format!("--fps {fps} is out of range"))
}

/// Image files directly under `dir`, sorted by file name.
fn frame_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let path = entry?.path();
        let is_frame = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if path.is_file() && is_frame {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn replay(
    mut session: Session,
    frames: &[PathBuf],
    interval: Duration,
    start: Instant,
    out: &mut impl Write,
) -> Result<()> {
    for (i, path) in frames.iter().enumerate() {
        let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let now = start + interval * i as u32;
        let result = session.process_bytes(&bytes, now);
        writeln!(out, "{}", serde_json::to_string(&result)?)?;
    }
    tracing::info!(
        frames = session.frames_processed(),
        failed = session.frames_failed(),
        "replay finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::Mutex;
    use vigil_core::{
        DetectionMethod, Embedding, FaceBox, Gallery, GalleryEntry, Landmarks, Point, VisionError,
        VisionModel,
    };

    /// One face per frame; the eye gap of each successive frame comes from
    /// `gaps`, giving an EAR of `gap / 12`.
    struct BlinkingVision {
        gaps: Mutex<Vec<i32>>,
    }

    impl VisionModel for BlinkingVision {
        fn detect(&self, _image: &RgbImage, _method: &DetectionMethod) -> Result<Vec<FaceBox>, VisionError> {
            Ok(vec![FaceBox::new(1, 3, 3, 1)])
        }

        fn landmarks(&self, _image: &RgbImage, _boxes: &[FaceBox]) -> Result<Vec<Landmarks>, VisionError> {
            let gap = {
                let mut gaps = self.gaps.lock().unwrap();
                if gaps.is_empty() {
                    5
                } else {
                    gaps.remove(0)
                }
            };
            let eye = vec![
                Point::new(0, 0),
                Point::new(4, 0),
                Point::new(8, 0),
                Point::new(12, 0),
                Point::new(8, gap),
                Point::new(4, gap),
            ];
            let mut landmarks = Landmarks::new();
            landmarks.insert("left_eye", eye.clone());
            landmarks.insert("right_eye", eye);
            Ok(vec![landmarks])
        }

        fn encode(&self, _image: &RgbImage, boxes: &[FaceBox]) -> Result<Vec<Embedding>, VisionError> {
            Ok(boxes.iter().map(|_| Embedding::new(vec![0.0, 0.1])).collect())
        }
    }

    fn session(gaps: Vec<i32>) -> Session {
        let gallery = Gallery::new(vec![GalleryEntry::new("carol", Embedding::new(vec![0.0, 0.0]))]).unwrap();
        let pipeline = FramePipeline::new(
            PipelineConfig::default(),
            Arc::new(gallery),
            Arc::new(BlinkingVision {
                gaps: Mutex::new(gaps),
            }),
        )
        .unwrap();
        Arc::new(pipeline).session()
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "vigil-replay-{name}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(path: &Path) {
        let img = RgbImage::from_pixel(16, 16, Rgb([100, 110, 120]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        std::fs::write(path, buf).unwrap();
    }

    #[test]
    fn test_frame_interval() {
        assert_eq!(frame_interval(10.0).unwrap(), Duration::from_millis(100));
        assert!(frame_interval(0.0).is_err());
        assert!(frame_interval(-5.0).is_err());
        assert!(frame_interval(f64::NAN).is_err());
    }

    #[test]
    fn test_frame_paths_sorted_and_filtered() {
        let dir = temp_dir("paths");
        write_png(&dir.join("b.png"));
        write_png(&dir.join("a.PNG"));
        std::fs::write(dir.join("notes.txt"), "x").unwrap();
        std::fs::create_dir(dir.join("c.png")).unwrap();

        let names: Vec<_> = frame_paths(&dir)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.PNG", "b.png"]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_replay_reproduces_blink() {
        let dir = temp_dir("blink");
        for i in 0..5 {
            write_png(&dir.join(format!("{i:03}.png")));
        }
        std::fs::write(dir.join("005.png"), b"corrupt").unwrap();
        let frames = frame_paths(&dir).unwrap();

        // open, closed, closed, open: the blink registers on the fourth frame
        let mut out = Vec::new();
        replay(
            session(vec![5, 2, 2, 5, 5]),
            &frames,
            Duration::from_millis(100),
            Instant::now(),
            &mut out,
        )
        .unwrap();

        let lines: Vec<serde_json::Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 6);
        let statuses: Vec<_> = lines[..5].iter().map(|l| l[0]["status"].as_str().unwrap()).collect();
        assert_eq!(statuses, ["Not Live", "Not Live", "Not Live", "Live", "Live"]);
        assert_eq!(lines[0][0]["name"], "carol");
        assert_eq!(lines[5], serde_json::json!([]));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
