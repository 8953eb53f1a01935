use serde::{Serialize, Serializer};

use crate::embedding::Embedding;
use crate::gallery::Gallery;

/// Wire label for a face that matched no gallery entry.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Outcome of matching one face against the gallery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Known(String),
    Unknown,
}

impl Identity {
    pub fn label(&self) -> Option<&str> {
        match self {
            Identity::Known(label) => Some(label),
            Identity::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &str {
        self.label().unwrap_or(UNKNOWN_LABEL)
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Identity::Known(_))
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub identity: Identity,
    /// Distance to the nearest gallery entry, `None` if nothing was comparable.
    pub distance: Option<f32>,
    /// Contact of the matched entry. Always `None` for [`Identity::Unknown`].
    pub contact: Option<String>,
}

impl MatchResult {
    fn unknown(distance: Option<f32>) -> Self {
        Self {
            identity: Identity::Unknown,
            distance,
            contact: None,
        }
    }
}

/// Assigns an identity to a query embedding.
pub trait Matcher: Send + Sync {
    fn identify(&self, query: &Embedding, gallery: &Gallery, threshold: f32) -> MatchResult;
}

/// Nearest neighbour by Euclidean distance with a rejection threshold.
///
/// Ties go to the earliest gallery entry. A nearest distance at or above the
/// threshold is rejected as [`Identity::Unknown`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn identify(&self, query: &Embedding, gallery: &Gallery, threshold: f32) -> MatchResult {
        let mut best: Option<(usize, f32)> = None;
        for (idx, entry) in gallery.entries().iter().enumerate() {
            let Some(distance) = query.distance(&entry.embedding) else {
                continue;
            };
            // strict `<` keeps the first index on ties
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((idx, distance));
            }
        }

        let Some((idx, distance)) = best else {
            if !gallery.is_empty() {
                tracing::debug!(
                    query_dim = query.dimension(),
                    gallery_dim = ?gallery.dimension(),
                    "query embedding not comparable with gallery"
                );
            }
            return MatchResult::unknown(None);
        };

        if distance >= threshold {
            return MatchResult::unknown(Some(distance));
        }

        let entry = &gallery.entries()[idx];
        MatchResult {
            identity: Identity::Known(entry.label.clone()),
            distance: Some(distance),
            contact: entry.contact.clone(),
        }
    }
}
