use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use vigil_core::enroll::load_known_faces;
use vigil_core::{DetectionMethod, Gallery, VisionModel};
use vigil_store::FaceStore;

/// Build the process-wide gallery: every stored enrollment, followed by the
/// photos under `known_faces_dir` when one is configured.
///
/// Runs once at startup. The result is never mutated; sessions share it
/// through an `Arc`.
pub async fn build(
    store: &FaceStore,
    known_faces_dir: Option<PathBuf>,
    vision: Arc<dyn VisionModel>,
    method: DetectionMethod,
) -> Result<Gallery> {
    let mut entries = store
        .load_entries()
        .await
        .context("failed to load enrollments")?;
    tracing::info!(entries = entries.len(), "stored enrollments loaded");

    if let Some(dir) = known_faces_dir {
        let imported = tokio::task::spawn_blocking(move || {
            load_known_faces(&dir, vision.as_ref(), &method)
                .with_context(|| format!("failed to import {}", dir.display()))
        })
        .await
        .context("known faces import task failed")??;
        entries.extend(imported);
    }

    Gallery::new(entries).context("enrollments do not form a consistent gallery")
}
