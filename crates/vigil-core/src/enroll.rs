//! Building gallery entries from reference photos.
//!
//! The known-faces directory holds one subdirectory per person, named after
//! the label to enroll, each containing one or more photos of that person:
//!
//! ```text
//! known_faces/
//!   alice/ 01.jpg 02.jpg
//!   bob/   portrait.png
//! ```

use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::embedding::Embedding;
use crate::gallery::{check_label, GalleryEntry};
use crate::vision::{DetectionMethod, VisionError, VisionModel};

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("no face detected")]
    NoFace,
    #[error("vision: {0}")]
    Vision(#[from] VisionError),
}

/// Detect faces in `image` and encode the first one.
pub fn encode_single_face(
    image: &RgbImage,
    vision: &dyn VisionModel,
    method: &DetectionMethod,
) -> Result<Embedding, EnrollError> {
    let boxes = vision.detect(image, method)?;
    let Some(first) = boxes.first() else {
        return Err(EnrollError::NoFace);
    };
    if boxes.len() > 1 {
        tracing::warn!(faces = boxes.len(), "several faces found, enrolling the first");
    }
    vision
        .encode(image, std::slice::from_ref(first))?
        .into_iter()
        .next()
        .ok_or(VisionError::CountMismatch {
            expected: 1,
            got: 0,
        })
        .map_err(EnrollError::from)
}

/// Load and encode one reference photo.
pub fn encode_image_file(
    path: &Path,
    vision: &dyn VisionModel,
    method: &DetectionMethod,
) -> Result<Embedding, EnrollError> {
    let image = image::open(path)
        .map_err(|source| EnrollError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();
    encode_single_face(&image, vision, method)
}

/// Encode every photo under `dir`, one label per subdirectory.
///
/// Only failing to list `dir` itself is an error. Photos that cannot be
/// decoded, contain no face, or fail in the vision model are logged and
/// skipped. Entries come out sorted by label, then file name.
pub fn load_known_faces(
    dir: &Path,
    vision: &dyn VisionModel,
    method: &DetectionMethod,
) -> Result<Vec<GalleryEntry>, EnrollError> {
    let mut entries = Vec::new();

    for person_dir in sorted_entries(dir)? {
        if !person_dir.is_dir() {
            continue;
        }
        let Some(label) = person_dir.file_name().and_then(|n| n.to_str()) else {
            tracing::warn!(path = %person_dir.display(), "skipping non UTF-8 directory name");
            continue;
        };
        if let Err(e) = check_label(label) {
            tracing::warn!(path = %person_dir.display(), error = %e, "skipping person directory");
            continue;
        }

        let files = match sorted_entries(&person_dir) {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable person directory");
                continue;
            }
        };

        for path in files.into_iter().filter(|p| p.is_file()) {
            match encode_image_file(&path, vision, method) {
                Ok(embedding) => {
                    tracing::info!(label, file = %path.display(), "loaded reference face");
                    entries.push(GalleryEntry::new(label, embedding));
                }
                Err(e) => {
                    tracing::warn!(label, file = %path.display(), error = %e, "skipped reference photo");
                }
            }
        }
    }

    tracing::info!(
        dir = %dir.display(),
        entries = entries.len(),
        "known faces loaded"
    );
    Ok(entries)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, EnrollError> {
    let io_err = |source| EnrollError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = fs::read_dir(dir)
        .map_err(io_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;
    paths.sort();
    Ok(paths)
}
