//! HTTP client for the face vision sidecar.
//!
//! The sidecar wraps a dlib-style detector, 68-point landmark predictor and
//! 128-d face encoder behind three JSON endpoints. Images travel as base64
//! PNG; boxes as `[top, right, bottom, left]`.
//!
//! | endpoint     | request                   | response                          |
//! |--------------|---------------------------|-----------------------------------|
//! | `/detect`    | `{"image", "model"}`      | `{"boxes": [[t,r,b,l], …]}`       |
//! | `/landmarks` | `{"image", "boxes"}`      | `{"landmarks": [{region: [[x,y], …]}, …]}` |
//! | `/encode`    | `{"image", "boxes"}`      | `{"encodings": [[f32; 128], …]}`  |

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageFormat, RgbImage};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::time::Duration;
use vigil_core::{DetectionMethod, Embedding, FaceBox, Landmarks, Point, VisionError, VisionModel};

#[derive(Serialize)]
struct DetectRequest<'a> {
    image: String,
    model: &'a str,
}

#[derive(Serialize)]
struct BoxesRequest {
    image: String,
    boxes: Vec<[i32; 4]>,
}

#[derive(Deserialize)]
struct DetectResponse {
    boxes: Vec<[i32; 4]>,
}

#[derive(Deserialize)]
struct LandmarksResponse {
    landmarks: Vec<BTreeMap<String, Vec<[i32; 2]>>>,
}

#[derive(Deserialize)]
struct EncodeResponse {
    encodings: Vec<Vec<f32>>,
}

/// Blocking client; one instance is shared by every session.
pub struct HttpVision {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpVision {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R, VisionError> {
        let url = format!("{}{}", self.base_url, path);
        let mut resp = self.agent.post(&url).send_json(body).map_err(|e| {
            tracing::debug!(%url, error = %e, "vision request failed");
            VisionError::Unavailable(format!("{url}: {e}"))
        })?;
        resp.body_mut()
            .read_json::<R>()
            .map_err(|e| VisionError::InvalidResponse(format!("{url}: {e}")))
    }
}

impl VisionModel for HttpVision {
    fn detect(&self, image: &RgbImage, method: &DetectionMethod) -> Result<Vec<FaceBox>, VisionError> {
        let req = DetectRequest {
            image: encode_png_base64(image)?,
            model: method.as_str(),
        };
        let resp: DetectResponse = self.post("/detect", &req)?;
        Ok(boxes_from_wire(resp.boxes))
    }

    fn landmarks(&self, image: &RgbImage, boxes: &[FaceBox]) -> Result<Vec<Landmarks>, VisionError> {
        let req = boxes_request(image, boxes)?;
        let resp: LandmarksResponse = self.post("/landmarks", &req)?;
        Ok(landmarks_from_wire(resp.landmarks))
    }

    fn encode(&self, image: &RgbImage, boxes: &[FaceBox]) -> Result<Vec<Embedding>, VisionError> {
        let req = boxes_request(image, boxes)?;
        let resp: EncodeResponse = self.post("/encode", &req)?;
        Ok(resp.encodings.into_iter().map(Embedding::new).collect())
    }
}

fn boxes_request(image: &RgbImage, boxes: &[FaceBox]) -> Result<BoxesRequest, VisionError> {
    Ok(BoxesRequest {
        image: encode_png_base64(image)?,
        boxes: boxes.iter().map(FaceBox::to_trbl).collect(),
    })
}

fn encode_png_base64(image: &RgbImage) -> Result<String, VisionError> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| VisionError::Unavailable(format!("png encode: {e}")))?;
    Ok(STANDARD.encode(buf))
}

fn boxes_from_wire(boxes: Vec<[i32; 4]>) -> Vec<FaceBox> {
    boxes.into_iter().map(FaceBox::from_trbl).collect()
}

fn landmarks_from_wire(sets: Vec<BTreeMap<String, Vec<[i32; 2]>>>) -> Vec<Landmarks> {
    sets.into_iter()
        .map(|regions| {
            regions
                .into_iter()
                .map(|(name, pts)| {
                    let points = pts.into_iter().map(|[x, y]| Point::new(x, y)).collect::<Vec<_>>();
                    (name, points)
                })
                .collect()
        })
        .collect()
}
