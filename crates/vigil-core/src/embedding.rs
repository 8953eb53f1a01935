use serde::{Deserialize, Serialize};

/// Fixed-length face descriptor produced by the vision model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    /// Euclidean distance, or `None` if the dimensions differ.
    pub fn distance(&self, other: &Embedding) -> Option<f32> {
        if self.values.len() != other.values.len() {
            return None;
        }
        let sum: f32 = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        Some(sum.sqrt())
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}
