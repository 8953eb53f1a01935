//! The enrolled face gallery.
//!
//! A [`Gallery`] is validated once when it is built and is immutable
//! afterwards. Sessions share it behind an `Arc`; replacing the gallery means
//! building a new one, never editing the old.

use std::collections::BTreeSet;
use thiserror::Error;

use crate::embedding::Embedding;
use crate::matcher::UNKNOWN_LABEL;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GalleryError {
    #[error("gallery entry {index} ({label}) has an empty embedding")]
    EmptyEmbedding { index: usize, label: String },
    #[error("gallery entry {index} ({label}) has dimension {got}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        label: String,
        expected: usize,
        got: usize,
    },
    #[error("gallery entry {index} ({label}) contains NaN/Inf")]
    NonFinite { index: usize, label: String },
    #[error("label {0:?} is reserved for unmatched faces")]
    ReservedLabel(String),
}

/// Reject labels that would be indistinguishable from an unmatched face on
/// the wire.
pub fn check_label(label: &str) -> Result<(), GalleryError> {
    if label == UNKNOWN_LABEL {
        return Err(GalleryError::ReservedLabel(label.to_string()));
    }
    Ok(())
}

/// One enrolled reference embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryEntry {
    pub label: String,
    pub embedding: Embedding,
    /// Contact identifier (e-mail) used to enrich results downstream.
    pub contact: Option<String>,
}

impl GalleryEntry {
    pub fn new(label: impl Into<String>, embedding: Embedding) -> Self {
        Self {
            label: label.into(),
            embedding,
            contact: None,
        }
    }

    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = Some(contact.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    pub fn new(entries: Vec<GalleryEntry>) -> Result<Self, GalleryError> {
        let expected = entries.first().map(|e| e.embedding.dimension());
        for (index, entry) in entries.iter().enumerate() {
            check_label(&entry.label)?;
            let got = entry.embedding.dimension();
            if got == 0 {
                return Err(GalleryError::EmptyEmbedding {
                    index,
                    label: entry.label.clone(),
                });
            }
            if let Some(expected) = expected {
                if got != expected {
                    return Err(GalleryError::DimensionMismatch {
                        index,
                        label: entry.label.clone(),
                        expected,
                        got,
                    });
                }
            }
            if !entry.embedding.is_finite() {
                return Err(GalleryError::NonFinite {
                    index,
                    label: entry.label.clone(),
                });
            }
        }
        Ok(Self { entries })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embedding dimension shared by every entry, `None` for an empty gallery.
    pub fn dimension(&self) -> Option<usize> {
        self.entries.first().map(|e| e.embedding.dimension())
    }

    /// Number of distinct labels (a person may have several reference images).
    pub fn identity_count(&self) -> usize {
        self.entries
            .iter()
            .map(|e| e.label.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }
}
