//! Scripted vision model for unit tests.

use image::{ImageFormat, Rgb, RgbImage};
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::Mutex;

use crate::embedding::Embedding;
use crate::geometry::{FaceBox, Landmarks, Point, LEFT_EYE, RIGHT_EYE};
use crate::vision::{DetectionMethod, VisionError, VisionModel};

/// What the fake model answers for one frame.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFrame {
    boxes: Vec<FaceBox>,
    landmarks: Vec<Landmarks>,
    embeddings: Vec<Embedding>,
    fail_detect: bool,
    fail_landmarks: bool,
}

impl ScriptedFrame {
    pub fn new(boxes: Vec<FaceBox>, landmarks: Vec<Landmarks>, embeddings: Vec<Embedding>) -> Self {
        Self {
            boxes,
            landmarks,
            embeddings,
            ..Self::default()
        }
    }

    pub fn detect_failure() -> Self {
        Self {
            fail_detect: true,
            ..Self::default()
        }
    }

    pub fn with_landmark_failure(mut self) -> Self {
        self.fail_landmarks = true;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct CallLog {
    pub detect_dims: Vec<(u32, u32)>,
    pub landmark_dims: Vec<(u32, u32)>,
    pub encode_dims: Vec<(u32, u32)>,
    pub encode_boxes: Vec<Vec<FaceBox>>,
}

/// Each `detect` call consumes the next scripted frame; `landmarks` and
/// `encode` answer from the frame most recently detected.
pub struct ScriptedVision {
    script: Mutex<VecDeque<ScriptedFrame>>,
    current: Mutex<ScriptedFrame>,
    calls: Mutex<CallLog>,
}

impl ScriptedVision {
    pub fn new(frames: Vec<ScriptedFrame>) -> Self {
        Self {
            script: Mutex::new(frames.into()),
            current: Mutex::new(ScriptedFrame::default()),
            calls: Mutex::new(CallLog::default()),
        }
    }

    pub fn calls(&self) -> CallLog {
        self.calls.lock().unwrap().clone()
    }
}

impl VisionModel for ScriptedVision {
    fn detect(
        &self,
        image: &RgbImage,
        _method: &DetectionMethod,
    ) -> Result<Vec<FaceBox>, VisionError> {
        self.calls.lock().unwrap().detect_dims.push(image.dimensions());
        let frame = self.script.lock().unwrap().pop_front().unwrap_or_default();
        *self.current.lock().unwrap() = frame.clone();
        if frame.fail_detect {
            return Err(VisionError::Unavailable("scripted failure".into()));
        }
        Ok(frame.boxes)
    }

    fn landmarks(&self, image: &RgbImage, _boxes: &[FaceBox]) -> Result<Vec<Landmarks>, VisionError> {
        self.calls.lock().unwrap().landmark_dims.push(image.dimensions());
        let current = self.current.lock().unwrap();
        if current.fail_landmarks {
            return Err(VisionError::InvalidResponse("scripted failure".into()));
        }
        Ok(current.landmarks.clone())
    }

    fn encode(&self, image: &RgbImage, boxes: &[FaceBox]) -> Result<Vec<Embedding>, VisionError> {
        let mut calls = self.calls.lock().unwrap();
        calls.encode_dims.push(image.dimensions());
        calls.encode_boxes.push(boxes.to_vec());
        Ok(self.current.lock().unwrap().embeddings.clone())
    }
}

/// Both eyes 12 px wide with lids `gap` px apart (EAR = gap / 12).
pub fn eye_landmarks(gap: i32) -> Landmarks {
    let eye = |x0: i32| {
        vec![
            Point::new(x0, 20),
            Point::new(x0 + 4, 20 - gap / 2),
            Point::new(x0 + 8, 20 - gap / 2),
            Point::new(x0 + 12, 20),
            Point::new(x0 + 8, 20 + gap - gap / 2),
            Point::new(x0 + 4, 20 + gap - gap / 2),
        ]
    };
    let mut lm = Landmarks::new();
    lm.insert(LEFT_EYE, eye(10));
    lm.insert(RIGHT_EYE, eye(30));
    lm
}

pub fn png_frame(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([90, 90, 90]));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}
