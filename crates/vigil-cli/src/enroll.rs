//! `vigil enroll` and `vigil import`: encode photos through the sidecar and
//! store the embeddings.

use anyhow::{Context, Result};
use std::path::PathBuf;
use vigil_core::enroll::{encode_image_file, load_known_faces};
use vigil_store::FaceStore;

use crate::VisionArgs;

pub async fn enroll(
    store: &FaceStore,
    label: String,
    contact: Option<String>,
    image: PathBuf,
    args: &VisionArgs,
) -> Result<()> {
    let vision = args.vision();
    let method = args.method();
    let path = image.clone();
    let embedding = tokio::task::spawn_blocking(move || encode_image_file(&path, vision.as_ref(), &method))
        .await
        .context("encoder task failed")?
        .with_context(|| format!("failed to enroll {}", image.display()))?;

    let id = store.insert(&label, contact.as_deref(), &embedding).await?;
    println!("Enrolled {label} ({id})");
    Ok(())
}

pub async fn import(store: &FaceStore, dir: PathBuf, args: &VisionArgs) -> Result<()> {
    let vision = args.vision();
    let method = args.method();
    let source = dir.clone();
    let entries = tokio::task::spawn_blocking(move || load_known_faces(&source, vision.as_ref(), &method))
        .await
        .context("import task failed")?
        .with_context(|| format!("failed to import {}", dir.display()))?;

    let mut stored = 0;
    for entry in &entries {
        store
            .insert(&entry.label, entry.contact.as_deref(), &entry.embedding)
            .await
            .with_context(|| format!("failed to store {}", entry.label))?;
        stored += 1;
    }

    println!("Imported {stored} photo(s) from {}", dir.display());
    Ok(())
}
